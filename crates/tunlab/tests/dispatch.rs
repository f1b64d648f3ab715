//! Dispatcher behavior: command execution against a live registry.

use std::time::{Duration, Instant};

use tunlab::dispatch::{parse, Command, Dispatcher, Flow};
use tunlab::registry::TunnelRegistry;

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn halt_tears_down_every_channel() {
    let mut registry = TunnelRegistry::new(Duration::from_secs(2));
    registry.spawn(1, &argv(&["cat"])).await.expect("spawn cat");
    registry.spawn(2, &argv(&["cat"])).await.expect("spawn cat");

    let mut dispatcher = Dispatcher::new();
    let halt = parse("halt").expect("parse").expect("command");
    assert_eq!(dispatcher.execute(&mut registry, halt).await, Flow::Halt);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn halt_with_no_channels_is_clean() {
    let mut registry = TunnelRegistry::new(Duration::from_secs(2));
    let mut dispatcher = Dispatcher::new();
    assert_eq!(
        dispatcher.execute(&mut registry, Command::Halt).await,
        Flow::Halt
    );
    assert!(registry.is_empty());
}

#[tokio::test]
async fn readline_against_unknown_id_reports_and_continues() {
    let mut registry = TunnelRegistry::new(Duration::from_secs(5));
    let mut dispatcher = Dispatcher::new();

    let start = Instant::now();
    let flow = dispatcher
        .handle_line(&mut registry, "tunnel 5 readline")
        .await;
    assert_eq!(flow, Flow::Continue);
    assert!(
        start.elapsed() < Duration::from_secs(1),
        "unknown-id readline must not block"
    );
    assert!(registry.is_empty());
}

#[tokio::test]
async fn forward_writes_raw_text_including_leading_token() {
    let mut registry = TunnelRegistry::new(Duration::from_secs(2));
    registry.spawn(7, &argv(&["cat"])).await.expect("spawn cat");

    let mut dispatcher = Dispatcher::new();
    let flow = dispatcher
        .handle_line(&mut registry, "tunnel 7 python hello world")
        .await;
    assert_eq!(flow, Flow::Continue);

    assert_eq!(
        registry.read_line(7).await.expect("read").as_deref(),
        Some("python hello world")
    );
    registry.teardown_all().await;
}

#[tokio::test]
async fn spawn_failure_degrades_that_command_only() {
    let mut registry = TunnelRegistry::new(Duration::from_secs(2));
    let mut dispatcher = Dispatcher::new();

    let flow = dispatcher
        .handle_line(&mut registry, "tunnel 1 mm-tunnelclient host 9000")
        .await;
    assert_eq!(flow, Flow::Continue);

    if registry.contains(1) {
        // Host actually has the emulator installed; nothing to assert.
        registry.teardown_all().await;
        return;
    }
    assert!(registry.is_empty());

    // The session keeps working after the failed launch.
    registry.spawn(2, &argv(&["cat"])).await.expect("spawn cat");
    registry.write_line(2, "still alive").await.expect("write");
    assert_eq!(
        registry.read_line(2).await.expect("read").as_deref(),
        Some("still alive")
    );
    registry.teardown_all().await;
}

#[tokio::test]
async fn malformed_and_unknown_lines_continue() {
    let mut registry = TunnelRegistry::new(Duration::from_secs(2));
    let mut dispatcher = Dispatcher::new();

    for line in ["", "   ", "bogus", "tunnel", "tunnel x readline", "prompt a b"] {
        assert_eq!(
            dispatcher.handle_line(&mut registry, line).await,
            Flow::Continue,
            "line {line:?} must not stop the loop"
        );
    }
    assert!(registry.is_empty());
}

#[tokio::test]
async fn prompt_updates_echo_prefix() {
    let mut registry = TunnelRegistry::new(Duration::from_secs(2));
    let mut dispatcher = Dispatcher::new();

    let flow = dispatcher.handle_line(&mut registry, "prompt $").await;
    assert_eq!(flow, Flow::Continue);

    // Subsequent commands still dispatch normally with a prompt set.
    let flow = dispatcher.handle_line(&mut registry, "halt").await;
    assert_eq!(flow, Flow::Halt);
}
