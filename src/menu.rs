use std::cell::RefCell;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::catalog::{self, ScanDefinition};
use crate::display::{self, ProgressView};
use crate::error::TargetError;
use crate::executable::find_executable;
use crate::state;
use crate::supervisor;
use crate::target::Target;
use crate::types::{ScanExecution, ScanOutcome};

const INVALID_SELECTION_PAUSE: Duration = Duration::from_millis(1500);
const ERROR_PAUSE: Duration = Duration::from_secs(2);
const PRIVILEGE_HINT: &str =
    "You might need to run this as sudo for certain scans (like Stealth or OS Detection).";

/// Menu state carried between interactions: the remembered target and where it lives.
#[derive(Debug, Clone)]
pub struct Session {
    state_file: PathBuf,
    last_target: Option<Target>,
}

/// Where the target for a scan came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetChoice {
    /// `r` was entered and a last target exists.
    Reused(Target),
    /// A literal that passed validation.
    Entered(Target),
}

impl Session {
    /// Start a session, picking up the last target from `state_file` if any.
    pub fn load(state_file: impl Into<PathBuf>) -> Self {
        let state_file = state_file.into();
        let last_target = state::load_last_target(&state_file);
        Self {
            state_file,
            last_target,
        }
    }

    pub fn last_target(&self) -> Option<&Target> {
        self.last_target.as_ref()
    }

    /// Interpret what the user typed at the target prompt.
    ///
    /// `r` (any case) reuses the last target when there is one; otherwise it
    /// is validated like any other literal and therefore rejected.
    pub fn resolve_target(&self, input: &str) -> Result<TargetChoice, TargetError> {
        let input = input.trim();
        if input.eq_ignore_ascii_case("r") {
            if let Some(last) = &self.last_target {
                return Ok(TargetChoice::Reused(last.clone()));
            }
        }
        Target::parse(input).map(TargetChoice::Entered)
    }

    /// Make `target` the last target. Failing to persist it is logged and otherwise ignored.
    pub fn remember(&mut self, target: Target) {
        if let Err(e) = state::save_last_target(&self.state_file, &target) {
            tracing::warn!(error = %e, "Could not persist last target");
        }
        self.last_target = Some(target);
    }
}

/// A parsed menu selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Scan(&'static ScanDefinition),
    Explain,
    Exit,
    Invalid,
}

/// Menu keys are trimmed and case-insensitive.
pub fn parse_choice(input: &str) -> MenuChoice {
    let key = input.trim().to_lowercase();
    match key.as_str() {
        "x" => MenuChoice::Exit,
        "e" => MenuChoice::Explain,
        k => catalog::lookup_scan(k)
            .map(MenuChoice::Scan)
            .unwrap_or(MenuChoice::Invalid),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

#[derive(Debug, Clone)]
pub struct MenuOptions {
    /// Program used in place of `nmap` from the catalog.
    pub program: String,
    /// Write each finished run as JSON here.
    pub output: Option<PathBuf>,
    /// Sleep after error messages so they can be read before the screen clears.
    pub pauses: bool,
    pub clear_screen: bool,
}

impl Default for MenuOptions {
    fn default() -> Self {
        Self {
            program: "nmap".into(),
            output: None,
            pauses: true,
            clear_screen: false,
        }
    }
}

/// The interactive loop. Generic over its input and output so it can be
/// driven without a terminal.
pub struct Menu<R, W> {
    input: R,
    out: W,
    session: Session,
    options: MenuOptions,
}

impl<R, W> Menu<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(input: R, out: W, session: Session, options: MenuOptions) -> Self {
        Self {
            input,
            out,
            session,
            options,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn into_parts(self) -> (W, Session) {
        (self.out, self.session)
    }

    /// Show the menu until the user exits or input ends.
    pub async fn run(&mut self) -> Result<()> {
        while self.step().await? == Flow::Continue {}
        Ok(())
    }

    /// Render the menu once and handle one selection.
    pub async fn step(&mut self) -> Result<Flow> {
        self.render_menu()?;
        let Some(input) = self.prompt("\nSelect a scan option").await? else {
            return Ok(Flow::Exit);
        };
        match parse_choice(&input) {
            MenuChoice::Exit => {
                writeln!(self.out, "{}", "Exiting...".red().bold())?;
                Ok(Flow::Exit)
            }
            MenuChoice::Explain => self.explain().await,
            MenuChoice::Scan(scan) => self.select_target_and_scan(scan).await,
            MenuChoice::Invalid => {
                writeln!(self.out, "{}", "Invalid selection.".red().bold())?;
                self.pause(INVALID_SELECTION_PAUSE).await;
                Ok(Flow::Continue)
            }
        }
    }

    fn render_menu(&mut self) -> Result<()> {
        if self.options.clear_screen {
            write!(self.out, "\x1b[2J\x1b[H")?;
        }
        writeln!(self.out, "{}", display::banner().bright_blue())?;
        for scan in catalog::list_scans() {
            writeln!(self.out, "{} {}", format!("{}.", scan.id).yellow(), scan.name)?;
        }
        writeln!(self.out, "{} Explain Scan Types", "E.".cyan())?;
        writeln!(self.out, "{} Exit", "X.".red())?;
        Ok(())
    }

    async fn explain(&mut self) -> Result<Flow> {
        writeln!(self.out, "\n{}\n", "Scan Explanations".blue().bold())?;
        for scan in catalog::list_scans() {
            writeln!(self.out, "{}", format!("{}. {}", scan.id, scan.name).yellow())?;
            writeln!(self.out, "   Command: {}", scan.command_line())?;
            writeln!(self.out, "   What it does: {}\n", scan.description)?;
        }
        self.wait_for_enter("Press Enter to return to menu...").await
    }

    async fn select_target_and_scan(&mut self, scan: &'static ScanDefinition) -> Result<Flow> {
        let prompt = match self.session.last_target() {
            Some(last) => format!(
                "Enter target IP or subnet (or press {} for {last})",
                "'r'".magenta().bold()
            ),
            None => "Enter target IP or subnet".to_string(),
        };
        let Some(input) = self.prompt(&prompt).await? else {
            return Ok(Flow::Exit);
        };

        let target = match self.session.resolve_target(&input) {
            Ok(TargetChoice::Reused(t)) => t,
            Ok(TargetChoice::Entered(t)) => {
                self.session.remember(t.clone());
                t
            }
            Err(e) => {
                tracing::debug!(input = %input.trim(), error = %e, "Rejected target");
                writeln!(self.out, "{}", "Invalid IP or subnet format.".red().bold())?;
                self.pause(ERROR_PAUSE).await;
                return Ok(Flow::Continue);
            }
        };

        if find_executable(&self.options.program).is_none() {
            writeln!(
                self.out,
                "{} {} is not installed.",
                "Error:".red().bold(),
                self.options.program
            )?;
            self.pause(ERROR_PAUSE).await;
            return Ok(Flow::Continue);
        }

        let execution = self.run_scan(scan, &target).await?;
        self.report(&execution)?;
        if let Some(path) = self.options.output.as_deref() {
            match execution.write_json(path) {
                Ok(()) => writeln!(self.out, "Wrote transcript to {}", path.display())?,
                Err(e) => writeln!(self.out, "{} {e:#}", "Error:".red().bold())?,
            }
        }
        self.wait_for_enter("\nPress Enter to return to menu...").await
    }

    async fn run_scan(&mut self, scan: &ScanDefinition, target: &Target) -> Result<ScanExecution> {
        let base = scan.arguments_with_program(&self.options.program);
        let command = supervisor::compose_command(&base, target);
        writeln!(self.out, "\n{} {}", "Targeting:".cyan().bold(), target)?;
        writeln!(self.out, "{} {}\n", "Command:".cyan().bold(), command.join(" ").dimmed())?;

        let view = RefCell::new(ProgressView::new(&mut self.out));
        let execution = supervisor::execute(
            &base,
            target,
            |line| {
                if let Err(e) = view.borrow_mut().line(line) {
                    tracing::debug!(error = %e, "Failed to echo scanner output");
                }
            },
            |percent| {
                if let Err(e) = view.borrow_mut().progress(percent) {
                    tracing::debug!(error = %e, "Failed to draw progress");
                }
            },
        )
        .await;
        Ok(execution)
    }

    fn report(&mut self, execution: &ScanExecution) -> Result<()> {
        match &execution.outcome {
            ScanOutcome::Success => {
                writeln!(self.out, "\n{}\n", "Scan complete!".green().bold())?;
            }
            ScanOutcome::Failure { code } => {
                let status = code.map_or_else(
                    || "terminated by signal".to_string(),
                    |c| format!("exit code {c}"),
                );
                writeln!(
                    self.out,
                    "\n{} ({status}) {PRIVILEGE_HINT}",
                    "Scan failed.".red().bold()
                )?;
            }
            ScanOutcome::LaunchError { reason } => {
                writeln!(
                    self.out,
                    "\n{} {reason}. {PRIVILEGE_HINT}",
                    "Could not start scan:".red().bold()
                )?;
            }
            ScanOutcome::Cancelled => {
                writeln!(self.out, "\n{}", "Scan cancelled.".yellow().bold())?;
            }
        }
        Ok(())
    }

    async fn wait_for_enter(&mut self, text: &str) -> Result<Flow> {
        Ok(match self.prompt(text).await? {
            Some(_) => Flow::Continue,
            None => Flow::Exit,
        })
    }

    /// Print `text` and read one line. `None` on end of input or Ctrl-C.
    ///
    /// Bytes that are not UTF-8 are replaced rather than rejected, so a stray
    /// byte becomes an invalid entry instead of an I/O error.
    async fn prompt(&mut self, text: &str) -> Result<Option<String>> {
        write!(self.out, "{text}: ")?;
        self.out.flush()?;
        let mut buf = Vec::new();
        let read = tokio::select! {
            read = self.input.read_until(b'\n', &mut buf) => {
                read.context("failed to read from stdin")?
            }
            _ = tokio::signal::ctrl_c() => {
                writeln!(self.out)?;
                return Ok(None);
            }
        };
        if read == 0 {
            return Ok(None);
        }
        let line = buf.strip_suffix(b"\n").unwrap_or(&buf);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        Ok(Some(String::from_utf8_lossy(line).into_owned()))
    }

    async fn pause(&self, duration: Duration) {
        if self.options.pauses {
            tokio::time::sleep(duration).await;
        }
    }
}
