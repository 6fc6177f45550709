#![cfg(unix)]

use std::time::Duration;

use recon_rs::supervisor::{execute, execute_with_cancel};
use recon_rs::target::Target;
use recon_rs::types::ScanOutcome;
use tokio_util::sync::CancellationToken;

/// `sh -c <script>`; the appended status flags and target land in `$0 $1 $2`.
fn shell(script: &str) -> Vec<String> {
    vec!["sh".into(), "-c".into(), script.into()]
}

fn localhost() -> Target {
    Target::parse("127.0.0.1").unwrap()
}

#[tokio::test]
async fn reports_progress_then_forced_completion() {
    let script = r#"echo "10.00% done"; echo "55.50% done"; echo "100.00% done""#;
    let mut lines = Vec::new();
    let mut progress = Vec::new();
    let exec = execute(
        &shell(script),
        &localhost(),
        |l| lines.push(l.to_string()),
        |p| progress.push(p),
    )
    .await;

    assert_eq!(exec.outcome, ScanOutcome::Success);
    assert_eq!(progress, vec![10.0, 55.5, 100.0, 100.0]);
    assert_eq!(lines, vec!["10.00% done", "55.50% done", "100.00% done"]);
    assert_eq!(exec.lines, lines);
    assert_eq!(exec.last_progress, 100.0);
}

#[tokio::test]
async fn nonzero_exit_is_failure_after_all_lines() {
    let script = "echo one; echo two; echo three; exit 1";
    let mut lines = Vec::new();
    let exec = execute(&shell(script), &localhost(), |l| lines.push(l.to_string()), |_| {}).await;

    assert_eq!(exec.outcome, ScanOutcome::Failure { code: Some(1) });
    assert_eq!(lines, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn missing_executable_is_launch_error_without_callbacks() {
    let args = vec!["/nonexistent/bin/nmap-missing".to_string(), "-sn".to_string()];
    let mut calls = 0;
    let mut progress_calls = 0;
    let exec = execute(&args, &localhost(), |_| calls += 1, |_| progress_calls += 1).await;

    assert!(matches!(
        exec.outcome,
        ScanOutcome::LaunchError { ref reason } if reason.contains("not found")
    ));
    assert_eq!(calls, 0);
    assert_eq!(progress_calls, 0);
    assert!(exec.lines.is_empty());
}

#[tokio::test]
async fn stderr_is_merged_in_order() {
    let script = "echo out1; echo err1 1>&2; echo out2; echo err2 1>&2";
    let exec = execute(&shell(script), &localhost(), |_| {}, |_| {}).await;
    assert_eq!(exec.lines, vec!["out1", "err1", "out2", "err2"]);
}

#[tokio::test]
async fn target_and_status_flags_are_appended() {
    // $0 is the first appended argument under `sh -c`.
    let exec = execute(&shell(r#"echo "$0 $1 $2""#), &localhost(), |_| {}, |_| {}).await;
    assert_eq!(exec.lines, vec!["--stats-every 5s 127.0.0.1"]);
    assert_eq!(
        exec.arguments[3..],
        ["--stats-every".to_string(), "5s".into(), "127.0.0.1".into()]
    );
}

#[tokio::test]
async fn integer_percentages_are_ignored() {
    let mut progress = Vec::new();
    let exec = execute(
        &shell(r#"echo "About 42% done"; printf 'tail 7.25%% done'"#),
        &localhost(),
        |_| {},
        |p| progress.push(p),
    )
    .await;
    assert_eq!(progress, vec![7.25, 100.0]);
    assert_eq!(exec.lines, vec!["About 42% done", "tail 7.25% done"]);
}

#[tokio::test]
async fn stdin_is_closed() {
    let exec = execute(&shell("cat; echo after"), &localhost(), |_| {}, |_| {}).await;
    assert_eq!(exec.outcome, ScanOutcome::Success);
    assert_eq!(exec.lines, vec!["after"]);
}

#[tokio::test]
async fn cancel_mid_scan_kills_child() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let mut progress_calls = 0;
    let args = shell("echo started; exec sleep 30");
    let target = localhost();
    let run = execute_with_cancel(
        &args,
        &target,
        cancel,
        |_| trigger.cancel(),
        |_| progress_calls += 1,
    );
    let exec = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("cancelled scan must not hang");

    assert_eq!(exec.outcome, ScanOutcome::Cancelled);
    assert_eq!(exec.lines, vec!["started"]);
    assert_eq!(progress_calls, 0);
}

#[tokio::test]
async fn cancel_while_silent() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });
    let args = shell("exec sleep 30");
    let target = localhost();
    let run = execute_with_cancel(&args, &target, cancel, |_| {}, |_| {});
    let exec = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("cancelled scan must not hang");
    assert_eq!(exec.outcome, ScanOutcome::Cancelled);
    assert!(exec.lines.is_empty());
}

#[tokio::test]
async fn started_at_is_rfc3339() {
    let exec = execute(&shell("true"), &localhost(), |_| {}, |_| {}).await;
    assert!(::time::OffsetDateTime::parse(
        &exec.started_at,
        &::time::format_description::well_known::Rfc3339
    )
    .is_ok());
}
