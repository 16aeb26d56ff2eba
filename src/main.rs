//! Flare command line client.
//!
//! Loads settings, initializes tracing and sends one message event to the
//! configured collector. Useful for checking a DSN end to end.

use anyhow::{bail, Context, Result};
use clap::Parser;
use flare_core::{EventOptions, Level, Scope};
use flare_delivery::{Client, Settings};
use tracing::info;

/// Send a test event to a collector.
#[derive(Debug, Parser)]
#[command(name = "flare", version, about)]
struct Cli {
    /// Event level (debug, info, warning, error, fatal).
    #[arg(short, long, default_value = "info")]
    level: Level,

    /// Collector DSN, overriding `flare.toml` and `FLARE_DSN`.
    #[arg(long)]
    dsn: Option<String>,

    /// Tag to attach, as `key=value`. May be repeated.
    #[arg(short, long = "tag", value_parser = parse_tag)]
    tags: Vec<(String, String)>,

    /// Message text.
    #[arg(required = true, num_args = 1..)]
    message: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load()?;
    if let Some(dsn) = cli.dsn {
        settings.dsn = Some(dsn);
        settings.validate()?;
    }

    init_tracing(&settings.rust_log)?;

    let config = settings.to_configuration().context("cannot send without a valid DSN")?;
    info!(
        server = %config.dsn().server(),
        project_id = config.dsn().project_id(),
        encoding = %config.encoding,
        "configuration loaded"
    );

    let client = Client::new(config).context("failed to create client")?;

    let mut options = EventOptions::new().level(cli.level);
    for (key, value) in cli.tags {
        options = options.tag(key, value);
    }

    let message = cli.message.join(" ");
    match client.capture_message(&message, &Scope::new(), options).await? {
        Some(event) => {
            println!("{}", event.event_id);
            Ok(())
        },
        None => bail!("event was not sent, see log output for the reason"),
    }
}

/// Initializes tracing, preferring `RUST_LOG` over the configured filter.
fn init_tracing(default_filter: &str) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .context("invalid log filter")?;

    let fmt_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
    Ok(())
}

fn parse_tag(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => bail!("tag must look like key=value, got {raw:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_level_tags_and_message() {
        let cli = Cli::try_parse_from([
            "flare", "--level", "warning", "-t", "region=eu", "--tag", "shard=2", "disk", "full",
        ])
        .unwrap();

        assert_eq!(cli.level, Level::Warning);
        assert_eq!(
            cli.tags,
            vec![("region".to_string(), "eu".to_string()), ("shard".to_string(), "2".to_string())]
        );
        assert_eq!(cli.message, vec!["disk", "full"]);
    }

    #[test]
    fn message_is_required() {
        assert!(Cli::try_parse_from(["flare"]).is_err());
    }

    #[test]
    fn malformed_tag_rejected() {
        assert!(parse_tag("novalue").is_err());
        assert!(parse_tag("=x").is_err());
        assert_eq!(parse_tag("a=b=c").unwrap(), ("a".to_string(), "b=c".to_string()));
    }
}
