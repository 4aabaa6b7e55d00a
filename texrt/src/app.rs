//! One typesetting run, from document text to rendered output

use crate::config::Cli;
use anyhow::{Context, Result};
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;
use texrt_host::diagnostics::{self, Diagnostic};
use texrt_host::{
    Artifacts, CommandRenderer, CompletionReason, DirectoryStore, Session, SessionError,
};

/// How a run ended, as seen by the calling process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    EmptyInput,
    Failed,
}

impl Status {
    pub fn exit_code(self) -> ExitCode {
        match self {
            Status::Success => ExitCode::SUCCESS,
            Status::EmptyInput => ExitCode::from(2),
            Status::Failed => ExitCode::FAILURE,
        }
    }
}

/// Summary of a run, written with `--report`
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub status: Status,
    pub completion: Option<CompletionReason>,
    pub output_bytes: usize,
    pub diagnostics: Vec<Diagnostic>,
    pub error: Option<String>,
}

impl Report {
    fn new(status: Status) -> Self {
        Self {
            status,
            completion: None,
            output_bytes: 0,
            diagnostics: Vec::new(),
            error: None,
        }
    }

    /// A failed run that never reached the engine
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(Status::Failed)
        }
    }
}

/// Result of a successful run
#[derive(Debug)]
pub struct Rendered {
    pub document: Vec<u8>,
    pub completion: CompletionReason,
    pub diagnostics: Vec<Diagnostic>,
}

/// Whether `input` has anything to typeset
pub fn is_blank(input: &str) -> bool {
    input.trim().is_empty()
}

/// Diagnostics from the session's log, if it has one
fn log_diagnostics(session: &mut Session) -> Vec<Diagnostic> {
    match session.read_log() {
        Ok(log) => diagnostics::extract(&log),
        Err(e) => {
            tracing::debug!(error = %e, "No log to scan for diagnostics");
            Vec::new()
        }
    }
}

/// Typeset `input`, returning the rendered document
///
/// On failure the engine's own diagnostics, if any, are returned alongside
/// the error.
pub async fn typeset(
    cli: &Cli,
    input: &str,
) -> std::result::Result<Rendered, (anyhow::Error, Vec<Diagnostic>)> {
    let artifacts = Artifacts::from_paths(&cli.image, &cli.snapshot)
        .context("Failed to load engine artifacts")
        .map_err(|e| (e, Vec::new()))?;

    let mut session = Session::new(cli.session_config())
        .context("Invalid session configuration")
        .map_err(|e| (e, Vec::new()))?;
    if let Some(root) = &cli.resources {
        session = session.with_resources(Arc::new(DirectoryStore::new(root)));
    }

    let result = execute(cli, &mut session, &artifacts, input).await;
    let diagnostics = if session.state() == texrt_host::LifecycleState::Finished {
        log_diagnostics(&mut session)
    } else {
        Vec::new()
    };
    if session.teardown().is_err() {
        tracing::debug!(state = ?session.state(), "Nothing to tear down");
    }

    match result {
        Ok((document, completion)) => Ok(Rendered {
            document,
            completion,
            diagnostics,
        }),
        Err(e) => Err((e, diagnostics)),
    }
}

async fn execute(
    cli: &Cli,
    session: &mut Session,
    artifacts: &Artifacts,
    input: &str,
) -> Result<(Vec<u8>, CompletionReason)> {
    session
        .load(artifacts, input)
        .context("Failed to load session")?;
    let completion = session.run().await.context("Engine run failed")?;

    let document = match &cli.renderer {
        Some(program) => {
            let renderer = CommandRenderer::new(program).args(cli.renderer_args.iter().cloned());
            session
                .render(&renderer)
                .await
                .context("Failed to render output")?
                .into_bytes()
        }
        None => session.read_output().context("Failed to read output")?,
    };
    Ok((document, completion))
}

/// Run the whole pipeline for `input`, writing the document with `emit`
pub async fn run(
    cli: &Cli,
    input: &str,
    emit: impl FnOnce(&[u8]) -> std::io::Result<()>,
) -> Report {
    if is_blank(input) {
        tracing::error!("Input is empty");
        return Report::new(Status::EmptyInput);
    }

    match typeset(cli, input).await {
        Ok(rendered) => {
            for diagnostic in &rendered.diagnostics {
                tracing::warn!(%diagnostic, "Engine reported a problem");
            }
            let mut report = Report::new(Status::Success);
            report.completion = Some(rendered.completion);
            report.output_bytes = rendered.document.len();
            report.diagnostics = rendered.diagnostics;

            if let Err(e) = emit(&rendered.document) {
                tracing::error!(error = %e, "Failed to write output");
                report.status = Status::Failed;
                report.error = Some(e.to_string());
            }
            report
        }
        Err((error, diagnostics)) => {
            let runtime = error
                .downcast_ref::<SessionError>()
                .is_some_and(SessionError::is_runtime_failure);
            let message = format!("{:#}", error);
            tracing::error!(error = %message, runtime, "Typesetting failed");
            for diagnostic in &diagnostics {
                tracing::error!(%diagnostic, "Engine diagnostic");
            }
            Report {
                diagnostics,
                ..Report::failed(message)
            }
        }
    }
}
