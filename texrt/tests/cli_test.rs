//! Pipeline tests: artifacts on disk, document in, rendered bytes out

use clap::Parser;
use std::path::Path;
use texrt::app;
use texrt::{Cli, Status};
use texrt_host::CompletionReason;

/// Copies input.tex to input.dvi, then logs an engine error if asked to
const ENGINE: &str = r#"
(module
  (import "env" "memory" (memory 1))
  (import "library" "reset" (func $reset (param i32 i32) (result i32)))
  (import "library" "rewrite" (func $rewrite (param i32 i32) (result i32)))
  (import "library" "get" (func $get (param i32 i32 i32)))
  (import "library" "put" (func $put (param i32 i32 i32)))
  (import "library" "eof" (func $eof (param i32) (result i32)))
  (import "library" "printString" (func $print_string (param i32 i32)))
  (import "library" "tex_final_end" (func $final_end))
  (func (export "main")
    (local $in i32) (local $out i32) (local $log i32)
    (local.set $log (call $rewrite (i32.const 9) (i32.const 48)))
    (call $print_string (local.get $log) (i32.const 64))
    (local.set $in (call $reset (i32.const 9) (i32.const 16)))
    (local.set $out (call $rewrite (i32.const 9) (i32.const 32)))
    (block $done
      (loop $next
        (call $get (local.get $in) (i32.const 128) (i32.const 1))
        (br_if $done (call $eof (local.get $in)))
        (call $put (local.get $out) (i32.const 128) (i32.const 1))
        (br $next)))
    (call $final_end)))
"#;

/// Logs an error and stops without writing output
const FAILING_ENGINE: &str = r#"
(module
  (import "env" "memory" (memory 1))
  (import "library" "rewrite" (func $rewrite (param i32 i32) (result i32)))
  (import "library" "printString" (func $print_string (param i32 i32)))
  (import "library" "tex_final_end" (func $final_end))
  (func (export "main")
    (call $print_string
      (call $rewrite (i32.const 9) (i32.const 48))
      (i32.const 64))
    (call $final_end)))
"#;

/// Two 64 KiB pages, matching `--memory-pages 2`
const MEMORY_SIZE: usize = 2 * 65_536;

fn snapshot(log_line: &[u8]) -> Vec<u8> {
    let mut memory = vec![0u8; MEMORY_SIZE];
    memory[16..25].copy_from_slice(b"input.tex");
    memory[32..41].copy_from_slice(b"input.dvi");
    memory[48..57].copy_from_slice(b"input.log");
    memory[64] = log_line.len() as u8;
    memory[65..65 + log_line.len()].copy_from_slice(log_line);
    memory
}

fn cli(dir: &Path, engine: &str, log_line: &[u8], extra: &[&str]) -> Cli {
    let image = dir.join("core.wasm");
    let dump = dir.join("core.dump");
    std::fs::write(&image, engine).unwrap();
    std::fs::write(&dump, snapshot(log_line)).unwrap();

    let mut args = vec![
        "texrt".to_string(),
        "--image".to_string(),
        image.display().to_string(),
        "--snapshot".to_string(),
        dump.display().to_string(),
        "--memory-pages".to_string(),
        "2".to_string(),
        "--scratch-pages".to_string(),
        "1".to_string(),
    ];
    args.extend(extra.iter().map(|s| s.to_string()));
    Cli::try_parse_from(args).unwrap()
}

#[tokio::test]
async fn test_raw_output_without_renderer() {
    let dir = tempfile::tempdir().unwrap();
    let cli = cli(dir.path(), ENGINE, b"This is a test engine", &[]);

    let mut written = Vec::new();
    let report = app::run(&cli, "\\draw (0,0);", |document| {
        written.extend_from_slice(document);
        Ok(())
    })
    .await;

    assert_eq!(report.status, Status::Success);
    assert_eq!(report.completion, Some(CompletionReason::FinalEnd));
    assert!(report.diagnostics.is_empty());
    assert_eq!(
        written,
        b"\\begin{document}\n\\draw (0,0);\n\\end{document}\n"
    );
    assert_eq!(report.output_bytes, written.len());
}

#[cfg(unix)]
#[tokio::test]
async fn test_renderer_output_is_normalized() {
    let dir = tempfile::tempdir().unwrap();
    // Stands in for a converter that forgets the closing tag
    let cli = cli(
        dir.path(),
        ENGINE,
        b"ok",
        &[
            "--renderer",
            "sh",
            "--renderer-arg",
            "-c",
            "--renderer-arg",
            "printf '<svg><g>'; cat >/dev/null",
        ],
    );

    let mut written = Vec::new();
    let report = app::run(&cli, "x", |document| {
        written.extend_from_slice(document);
        Ok(())
    })
    .await;

    assert_eq!(report.status, Status::Success);
    assert_eq!(String::from_utf8(written).unwrap(), "<svg><g></svg>");
}

#[tokio::test]
async fn test_engine_diagnostics_reported_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let cli = cli(
        dir.path(),
        FAILING_ENGINE,
        b"! Undefined control sequence.",
        &[],
    );

    let report = app::run(&cli, "\\foo", |_| Ok(())).await;

    assert_eq!(report.status, Status::Failed);
    assert!(report.error.unwrap().contains("Output file not found"));
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(
        report.diagnostics[0].message,
        " Undefined control sequence."
    );
}

#[tokio::test]
async fn test_empty_input() {
    let dir = tempfile::tempdir().unwrap();
    let cli = cli(dir.path(), ENGINE, b"", &[]);
    let report = app::run(&cli, "\n\n", |_| Ok(())).await;
    assert_eq!(report.status, Status::EmptyInput);
}
