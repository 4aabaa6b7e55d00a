//! Conversion of the module's binary output into a markup document
//!
//! The conversion itself is external; [`Renderer`] only feeds bytes in and
//! takes text out. [`normalize_document`] is applied to whatever comes back so
//! the result always has a balanced wrapper element.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Errors from an output converter
#[derive(Debug, Error)]
pub enum RenderError {
    /// The converter program could not be started
    #[error("Failed to start renderer '{program}': {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Talking to the converter failed
    #[error("Renderer I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The converter exited unsuccessfully
    #[error("Renderer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    /// The converter produced non-UTF-8 output
    #[error("Renderer produced invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Converts output bytes into a markup document
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, output: &[u8]) -> Result<String, RenderError>;
}

/// Renderer that pipes output through an external program
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandRenderer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add arguments passed to the program
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

#[async_trait]
impl Renderer for CommandRenderer {
    async fn render(&self, output: &[u8]) -> Result<String, RenderError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RenderError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(output).await?;
            // Dropping stdin closes the pipe so the program sees end of input
        }

        let result = child.wait_with_output().await?;
        if !result.status.success() {
            return Err(RenderError::Failed {
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        tracing::debug!(
            program = %self.program.display(),
            input_bytes = output.len(),
            output_bytes = result.stdout.len(),
            "Output rendered"
        );
        Ok(String::from_utf8(result.stdout)?)
    }
}

/// Count start tags of `element`, ignoring self-closing ones
fn count_open_tags(text: &str, element: &str) -> usize {
    let pattern = format!("<{}", element);
    text.match_indices(&pattern)
        .filter(|(index, _)| {
            let rest = &text[index + pattern.len()..];
            let boundary = rest
                .chars()
                .next()
                .is_some_and(|c| c == '>' || c == '/' || c.is_whitespace());
            let self_closing = rest
                .find('>')
                .is_some_and(|end| rest[..end].ends_with('/'));
            boundary && !self_closing
        })
        .count()
}

/// Balance the wrapper `element` in a rendered document
///
/// A document with no start tag is wrapped in one. Missing end tags are
/// appended.
pub fn normalize_document(text: &str, element: &str) -> String {
    let mut document = text.trim_end().to_string();
    let mut opened = count_open_tags(&document, element);
    if opened == 0 {
        document = format!("<{}>{}", element, document);
        opened = 1;
    }

    let closer = format!("</{}>", element);
    let closed = document.matches(&closer).count();
    for _ in closed..opened {
        document.push_str(&closer);
    }
    document
}
