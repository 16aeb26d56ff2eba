//! End-to-end tests for the command line client.
//!
//! Runs the `flare` binary against a mock collector and checks what arrives
//! on the wire and what the process reports back.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use std::process::Output;

use anyhow::Result;
use flare_testing::MockCollector;
use tokio::process::Command;

async fn run_flare(dsn: &str, envs: &[(&str, &str)], args: &[&str]) -> Result<Output> {
    let mut command = Command::new(env!("CARGO_BIN_EXE_flare"));
    command.env("FLARE_DSN", dsn).env_remove("RUST_LOG").args(args);
    for (key, value) in envs {
        command.env(key, value);
    }
    Ok(command.output().await?)
}

/// The golden path: one message, compressed, accepted by the collector.
#[tokio::test]
async fn cli_sends_message_and_prints_event_id() -> Result<()> {
    let collector = MockCollector::start().await;
    collector.accept_events().await;

    let output = run_flare(&collector.dsn(), &[], &["deploy", "finished"]).await?;
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let printed = String::from_utf8(output.stdout)?.trim().to_string();
    assert_eq!(printed.len(), 32);

    let received = collector.received_events().await;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].content_type.as_deref(), Some("application/octet-stream"));

    let hash = received[0].decode()?;
    assert_eq!(hash["event_id"], printed);
    assert_eq!(hash["message"], "deploy finished");
    assert_eq!(hash["level"], "info");
    Ok(())
}

#[tokio::test]
async fn cli_applies_level_tags_and_environment_settings() -> Result<()> {
    let collector = MockCollector::start().await;
    collector.accept_events().await;

    let output = run_flare(
        &collector.dsn(),
        &[("FLARE_ENCODING", "none"), ("FLARE_ENVIRONMENT", "staging"), ("FLARE_RELEASE", "1.4.2")],
        &["--level", "warning", "--tag", "region=eu", "cache", "miss"],
    )
    .await?;
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let received = collector.received_events().await;
    assert_eq!(received[0].content_type.as_deref(), Some("application/json"));

    let hash = received[0].decode()?;
    assert_eq!(hash["level"], "warning");
    assert_eq!(hash["tags"]["region"], "eu");
    assert_eq!(hash["environment"], "staging");
    assert_eq!(hash["release"], "1.4.2");
    Ok(())
}

#[tokio::test]
async fn cli_fails_when_collector_rejects() -> Result<()> {
    let collector = MockCollector::start().await;
    collector.reject_events(401, "invalid api key").await;

    let output = run_flare(&collector.dsn(), &[], &["unauthorized"]).await?;

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid api key"), "stderr: {stderr}");
    Ok(())
}

#[tokio::test]
async fn cli_rejects_invalid_dsn() -> Result<()> {
    let output = run_flare("not-a-dsn", &[], &["hello"]).await?;

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("dsn is invalid"));
    Ok(())
}

#[tokio::test]
async fn cli_environment_filter_blocks_send() -> Result<()> {
    let collector = MockCollector::start().await;
    collector.accept_events().await;

    let output = run_flare(
        &collector.dsn(),
        &[("FLARE_ENVIRONMENTS", "[production]"), ("FLARE_ENVIRONMENT", "development")],
        &["filtered"],
    )
    .await?;

    assert!(!output.status.success());
    collector.assert_event_count(0).await;
    Ok(())
}
