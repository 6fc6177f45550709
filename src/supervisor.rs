use std::future::{self, Future};
use std::io::{self, BufRead, BufReader, PipeReader};
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::sync::OnceLock;
use std::thread;

use ::time::{format_description::well_known, OffsetDateTime};
use regex::Regex;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::target::Target;
use crate::types::{ScanExecution, ScanOutcome};

/// Appended to every command so nmap prints a status line every five seconds.
pub const STATUS_FLAGS: [&str; 2] = ["--stats-every", "5s"];

const LINE_CHANNEL_CAPACITY: usize = 256;

type Interrupt = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Run one scan to completion, streaming its merged stdout/stderr.
///
/// - `on_line` is called once per output line, in order, without the line ending.
/// - `on_progress` is called for every `NN.NN% done` status line and once more
///   with `100.0` after a normal exit.
/// - Ctrl-C kills the child and resolves to [`ScanOutcome::Cancelled`].
///
/// Neither callback is invoked when the process cannot be started.
pub async fn execute<L, P>(
    base_arguments: &[String],
    target: &Target,
    on_line: L,
    on_progress: P,
) -> ScanExecution
where
    L: FnMut(&str),
    P: FnMut(f64),
{
    execute_internal(base_arguments, target, None, on_line, on_progress).await
}

/// Variant of [`execute`] that can also be cancelled through `cancel`.
pub async fn execute_with_cancel<L, P>(
    base_arguments: &[String],
    target: &Target,
    cancel: CancellationToken,
    on_line: L,
    on_progress: P,
) -> ScanExecution
where
    L: FnMut(&str),
    P: FnMut(f64),
{
    execute_internal(base_arguments, target, Some(cancel), on_line, on_progress).await
}

/// Base arguments followed by the status flags and the target.
pub fn compose_command(base_arguments: &[String], target: &Target) -> Vec<String> {
    let mut command = base_arguments.to_vec();
    command.extend(STATUS_FLAGS.iter().map(|f| f.to_string()));
    command.push(target.to_string());
    command
}

/// Extract the percentage from an nmap status line such as
/// `SYN Stealth Scan Timing: About 42.17% done; ETC: 10:31 (0:00:41 remaining)`.
///
/// The fractional part is required; `42% done` does not match.
pub fn parse_progress(line: &str) -> Option<f64> {
    static DONE: OnceLock<Regex> = OnceLock::new();
    let re = DONE.get_or_init(|| Regex::new(r"(\d+\.\d+)% done").expect("progress regex"));
    re.captures(line)?.get(1)?.as_str().parse().ok()
}

enum Exit {
    Cancelled,
    Exited(io::Result<ExitStatus>),
}

async fn execute_internal<L, P>(
    base_arguments: &[String],
    target: &Target,
    cancel_opt: Option<CancellationToken>,
    mut on_line: L,
    mut on_progress: P,
) -> ScanExecution
where
    L: FnMut(&str),
    P: FnMut(f64),
{
    let arguments = compose_command(base_arguments, target);
    let mut execution = ScanExecution {
        arguments: arguments.clone(),
        started_at: now_rfc3339(),
        lines: Vec::new(),
        last_progress: 0.0,
        outcome: ScanOutcome::Success,
    };

    // Subscribed before the child exists so no Ctrl-C is missed.
    let mut interrupt = subscribe_interrupt();

    let (mut child, reader) = match spawn_merged(&arguments) {
        Ok(spawned) => spawned,
        Err(e) => {
            tracing::warn!(command = ?arguments, error = %e, "Failed to launch scanner");
            execution.outcome = ScanOutcome::LaunchError {
                reason: launch_reason(&arguments, &e),
            };
            return execution;
        }
    };
    tracing::info!(command = ?arguments, pid = ?child.id(), "Scanner started");

    let (tx, mut rx) = mpsc::channel::<String>(LINE_CHANNEL_CAPACITY);
    let spawned_reader = thread::Builder::new()
        .name("scan-output".into())
        .spawn(move || forward_lines(reader, tx));
    if let Err(e) = spawned_reader {
        tracing::error!(error = %e, "Failed to start output reader");
        terminate(&mut child).await;
        execution.outcome = ScanOutcome::LaunchError {
            reason: format!("cannot read scanner output: {e}"),
        };
        return execution;
    }

    let cancel = cancel_opt.unwrap_or_default();

    // The interrupt is polled ahead of output and exit, so a Ctrl-C that also
    // ended the child still counts as a cancellation.
    let mut cancelled = false;
    loop {
        tokio::select! {
            biased;
            _ = &mut interrupt => {
                cancelled = true;
                break;
            }
            _ = cancel.cancelled() => {
                cancelled = true;
                break;
            }
            msg = rx.recv() => match msg {
                Some(line) => {
                    on_line(&line);
                    if let Some(percent) = parse_progress(&line) {
                        execution.last_progress = percent;
                        on_progress(percent);
                    }
                    execution.lines.push(line);
                }
                None => break,
            },
        }
    }

    let exit = if cancelled {
        Exit::Cancelled
    } else {
        tokio::select! {
            biased;
            _ = &mut interrupt => Exit::Cancelled,
            _ = cancel.cancelled() => Exit::Cancelled,
            status = child.wait() => Exit::Exited(status),
        }
    };
    let exit = match exit {
        Exit::Exited(status) => {
            if interrupt_pending(&mut interrupt).await {
                Exit::Cancelled
            } else {
                Exit::Exited(status)
            }
        }
        cancelled => cancelled,
    };

    execution.outcome = match exit {
        Exit::Cancelled => {
            terminate(&mut child).await;
            tracing::info!(lines = execution.lines.len(), "Scan cancelled");
            ScanOutcome::Cancelled
        }
        Exit::Exited(Ok(status)) => {
            execution.last_progress = 100.0;
            on_progress(100.0);
            tracing::info!(%status, lines = execution.lines.len(), "Scanner exited");
            if status.success() {
                ScanOutcome::Success
            } else {
                ScanOutcome::Failure {
                    code: status.code(),
                }
            }
        }
        Exit::Exited(Err(e)) => {
            tracing::warn!(error = %e, "Failed to wait for scanner");
            ScanOutcome::Failure { code: None }
        }
    };
    execution
}

/// True if a Ctrl-C has arrived. A terminal Ctrl-C reaches the child too, so
/// its exit can be seen before the signal driver has published the interrupt;
/// yielding lets the driver run first.
async fn interrupt_pending(interrupt: &mut Interrupt) -> bool {
    tokio::task::yield_now().await;
    tokio::select! {
        biased;
        _ = interrupt => true,
        _ = future::ready(()) => false,
    }
}

/// Listen for Ctrl-C from now on. Unlike `tokio::signal::ctrl_c`, the
/// platform listeners register immediately rather than on first poll.
fn subscribe_interrupt() -> Interrupt {
    match listen_for_interrupt() {
        Ok(interrupt) => interrupt,
        Err(e) => {
            tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
            Box::pin(future::pending())
        }
    }
}

#[cfg(unix)]
fn listen_for_interrupt() -> io::Result<Interrupt> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigint = signal(SignalKind::interrupt())?;
    Ok(Box::pin(async move {
        if sigint.recv().await.is_none() {
            future::pending::<()>().await;
        }
    }))
}

#[cfg(windows)]
fn listen_for_interrupt() -> io::Result<Interrupt> {
    let mut ctrl_c = tokio::signal::windows::ctrl_c()?;
    Ok(Box::pin(async move {
        if ctrl_c.recv().await.is_none() {
            future::pending::<()>().await;
        }
    }))
}

/// Start the process with stdout and stderr sharing one pipe and stdin closed.
fn spawn_merged(arguments: &[String]) -> io::Result<(Child, PipeReader)> {
    let (program, args) = arguments
        .split_first()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;
    let (reader, writer) = io::pipe()?;
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(writer.try_clone()?)
        .stderr(writer)
        .kill_on_drop(true);
    // `cmd` still owns the write ends; they close when it drops here, so the
    // reader sees EOF once the child exits.
    let child = cmd.spawn()?;
    Ok((child, reader))
}

fn forward_lines(reader: PipeReader, tx: mpsc::Sender<String>) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                if tx.blocking_send(decode_line(&buf)).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Reading scanner output failed");
                break;
            }
        }
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

async fn terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "Scanner already gone");
    }
    if let Err(e) = child.wait().await {
        tracing::warn!(error = %e, "Failed to reap scanner");
    }
}

fn launch_reason(arguments: &[String], e: &io::Error) -> String {
    let program = arguments.first().map(String::as_str).unwrap_or("<none>");
    match e.kind() {
        io::ErrorKind::NotFound => format!("{program}: executable not found"),
        io::ErrorKind::PermissionDenied => format!("{program}: permission denied"),
        _ => format!("{program}: {e}"),
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_from_nmap_status_line() {
        let line = "SYN Stealth Scan Timing: About 42.17% done; ETC: 10:31 (0:00:41 remaining)";
        assert_eq!(parse_progress(line), Some(42.17));
        assert_eq!(parse_progress("100.00% done"), Some(100.0));
    }

    #[test]
    fn progress_uses_first_match() {
        assert_eq!(parse_progress("1.50% done then 9.99% done"), Some(1.5));
    }

    #[test]
    fn progress_requires_fraction() {
        assert_eq!(parse_progress("About 42% done"), None);
        assert_eq!(parse_progress("Nmap scan report for 10.0.0.1"), None);
        assert_eq!(parse_progress("12.5 % done"), None);
    }

    #[test]
    fn command_appends_status_flags_and_target() {
        let base = vec!["nmap".to_string(), "-sn".to_string()];
        let target = Target::parse("10.0.0.0/24").unwrap();
        assert_eq!(
            compose_command(&base, &target),
            vec!["nmap", "-sn", "--stats-every", "5s", "10.0.0.0/24"]
        );
    }

    #[test]
    fn decode_strips_line_endings() {
        assert_eq!(decode_line(b"abc\n"), "abc");
        assert_eq!(decode_line(b"abc\r\n"), "abc");
        assert_eq!(decode_line(b"abc"), "abc");
        assert_eq!(decode_line(b"a\xffb\n"), "a\u{fffd}b");
    }

    #[test]
    fn launch_reason_names_program() {
        let args = vec!["nmap".to_string()];
        let e = io::Error::from(io::ErrorKind::NotFound);
        assert_eq!(launch_reason(&args, &e), "nmap: executable not found");
    }
}
