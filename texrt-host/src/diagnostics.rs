//! Error reports embedded in the module's log
//!
//! The module writes its own errors into the log file as a line starting with
//! `!`, followed by context lines. These are advisory; a run with diagnostics
//! can still produce output.

use serde::Serialize;

const MARKER: char = '!';

/// One error report from the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// The marker line, without the marker
    pub message: String,

    /// Context lines that followed it
    pub context: Vec<String>,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", MARKER, self.message)?;
        for line in &self.context {
            write!(f, "\n{}", line)?;
        }
        Ok(())
    }
}

/// Collect every marker block in `log`
///
/// A block is a marker line plus the non-blank lines directly after it, up to
/// the next marker line.
pub fn extract(log: &str) -> Vec<Diagnostic> {
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let mut collecting = false;

    for line in log.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(message) = line.strip_prefix(MARKER) {
            diagnostics.push(Diagnostic {
                message: message.to_string(),
                context: Vec::new(),
            });
            collecting = true;
        } else if line.trim().is_empty() {
            collecting = false;
        } else if collecting {
            if let Some(current) = diagnostics.last_mut() {
                current.context.push(line.to_string());
            }
        }
    }
    diagnostics
}
