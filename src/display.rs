use std::io::{self, Write};
use std::time::{Duration, Instant};

use colored::Colorize;

const BAR_WIDTH: usize = 30;

pub fn banner() -> &'static str {
    r#"
 ██████╗ ███████╗ ██████╗ ██████╗ ███╗   ██╗
 ██╔══██╗██╔════╝██╔════╝██╔═══██╗████╗  ██║
 ██████╔╝█████╗  ██║     ██║   ██║██╔██╗ ██║
 ██╔══██╗██╔══╝  ██║     ██║   ██║██║╚██╗██║
 ██║  ██║███████╗╚██████╗╚██████╔╝██║ ╚████║
 ╚═╝  ╚═╝╚══════╝ ╚═════╝ ╚═════╝ ╚═╝  ╚═══╝

=============================================
Simplified Nmap Interface for Beginners
=============================================
"#
}

/// `Scanning... [#######-------]  25% 0:00:42`
pub fn render_bar(percent: f64, elapsed: Duration) -> String {
    let percent = percent.clamp(0.0, 100.0);
    let filled = ((percent / 100.0) * BAR_WIDTH as f64).round() as usize;
    format!(
        "Scanning... [{}{}] {:>3.0}% {}",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        percent,
        format_elapsed(elapsed)
    )
}

/// `H:MM:SS`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Live view of a running scan: echoes output lines and redraws the bar
/// whenever the shown percentage moves forward.
pub struct ProgressView<W> {
    out: W,
    started: Instant,
    shown: Option<f64>,
}

impl<W: Write> ProgressView<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            started: Instant::now(),
            shown: None,
        }
    }

    pub fn line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "  {}", line.dimmed())
    }

    /// Draw the bar for `percent`. Values at or below the one already shown
    /// are ignored so the display never moves backwards.
    pub fn progress(&mut self, percent: f64) -> io::Result<()> {
        let percent = percent.clamp(0.0, 100.0);
        if self.shown.is_some_and(|shown| percent <= shown) {
            return Ok(());
        }
        self.shown = Some(percent);
        let bar = render_bar(percent, self.started.elapsed());
        writeln!(self.out, "  {}", bar.cyan())?;
        self.out.flush()
    }
}
