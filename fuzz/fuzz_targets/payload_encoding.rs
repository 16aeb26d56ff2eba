#![no_main]

//! Fuzz target for payload decoding and scrubbing.
//!
//! Feeds arbitrary bytes through both decoders. Whatever decodes must survive
//! scrubbing and re-encode to a payload that decodes again.

use flare_delivery::{
    encoding::{decode, encode, Encoding},
    scrub::Scrubber,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for encoding in [Encoding::None, Encoding::Gzip] {
        let Ok(mut hash) = decode(data, encoding) else {
            continue;
        };

        if let Ok(scrubber) = Scrubber::new(&[]) {
            scrubber.scrub(&mut hash);
        }

        if let Ok(payload) = encode(&hash, encoding) {
            assert!(decode(&payload.body, encoding).is_ok());
        }
    }
});
