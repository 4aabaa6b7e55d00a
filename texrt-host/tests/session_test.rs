//! End-to-end session tests against small hand-written modules
//!
//! The modules stand in for the real engine: they import the same host
//! functions, find their file names in the memory snapshot and exercise the
//! same call patterns (terminal line input, byte copying, log output).

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use texrt_abi::PAGE_SIZE;
use texrt_host::{
    diagnostics, Artifacts, CompletionReason, DirectoryStore, FixedClock, LifecycleState,
    RenderError, Renderer, Session, SessionConfig, SessionError,
};

const TTY: usize = 0;
const INPUT: usize = 16;
const OUTPUT: usize = 32;
const LOG: usize = 48;
const DONE: usize = 64;
const FONT: usize = 80;
const MISSING: usize = 112;

const IMPORTS: &str = r#"
  (import "env" "memory" (memory 1))
  (import "library" "reset" (func $reset (param i32 i32) (result i32)))
  (import "library" "rewrite" (func $rewrite (param i32 i32) (result i32)))
  (import "library" "get" (func $get (param i32 i32 i32)))
  (import "library" "put" (func $put (param i32 i32 i32)))
  (import "library" "eof" (func $eof (param i32) (result i32)))
  (import "library" "erstat" (func $erstat (param i32) (result i32)))
  (import "library" "inputln"
    (func $inputln (param i32 i32 i32 i32 i32 i32 i32) (result i32)))
  (import "library" "printString" (func $print_string (param i32 i32)))
  (import "library" "printChar" (func $print_char (param i32 i32)))
  (import "library" "printInteger" (func $print_integer (param i32 i32)))
  (import "library" "printNewline" (func $print_newline (param i32)))
  (import "library" "getCurrentMonth" (func $month (result i32)))
  (import "library" "getCurrentYear" (func $year (result i32)))
  (import "library" "tex_final_end" (func $final_end))

  ;; Copy every byte of $from to $to through the one-byte cell at 128
  (func $copy (param $from i32) (param $to i32)
    (block $done
      (loop $next
        (call $get (local.get $from) (i32.const 128) (i32.const 1))
        (br_if $done (call $eof (local.get $from)))
        (call $put (local.get $to) (i32.const 128) (i32.const 1))
        (br $next))))

  (func $read_terminal_line (param $tty i32) (result i32)
    (call $inputln (local.get $tty) (i32.const 1)
      (i32.const 1024) (i32.const 256) (i32.const 260) (i32.const 264)
      (i32.const 256)))
"#;

/// Echo the first terminal line to the log, copy the input to the output
const TYPESET: &str = r#"
  (func (export "main")
    (local $tty i32) (local $log i32)
    (local.set $tty (call $reset (i32.const 4) (i32.const 0)))
    (local.set $log (call $rewrite (i32.const 9) (i32.const 48)))
    (drop (call $read_terminal_line (local.get $tty)))
    (call $put (local.get $log) (i32.const 1024) (i32.load (i32.const 260)))
    (call $print_newline (local.get $log))
    (call $copy
      (call $reset (i32.const 9) (i32.const 16))
      (call $rewrite (i32.const 9) (i32.const 32)))
    (call $print_string (local.get $log) (i32.const 64))
    (call $final_end))
"#;

/// Read terminal lines until there are none left, then return
const DRAIN_TERMINAL: &str = r#"
  (func (export "main")
    (local $tty i32)
    (local.set $tty (call $reset (i32.const 4) (i32.const 0)))
    (block $done
      (loop $next
        (br_if $done (i32.eqz (call $read_terminal_line (local.get $tty))))
        (br $next))))
"#;

/// Copy a font from the resource store; log the status of a missing file
const RESOURCES: &str = r#"
  (func (export "main")
    (local $log i32)
    (local.set $log (call $rewrite (i32.const 9) (i32.const 48)))
    (call $copy
      (call $reset (i32.const 18) (i32.const 80))
      (call $rewrite (i32.const 9) (i32.const 32)))
    (call $print_integer (local.get $log)
      (call $erstat (call $reset (i32.const 11) (i32.const 112))))
    (call $final_end))
"#;

/// Log the date
const CLOCK: &str = r#"
  (func (export "main")
    (local $log i32)
    (local.set $log (call $rewrite (i32.const 9) (i32.const 48)))
    (call $print_integer (local.get $log) (call $year))
    (call $print_char (local.get $log) (i32.const 47))
    (call $print_integer (local.get $log) (call $month))
    (call $final_end)
    (call $final_end))
"#;

const FINAL_END_ONLY: &str = r#"(func (export "main") (call $final_end))"#;

const SILENT: &str = r#"(func (export "main"))"#;

const SPIN: &str = r#"(func (export "main") (loop $forever (br $forever)))"#;

const WILD_POINTER: &str = r#"
  (func (export "main")
    (call $print_string (i32.const -1) (i32.const 0x7ffffff0)))
"#;

fn module(body: &str) -> Vec<u8> {
    format!("(module {} {})", IMPORTS, body).into_bytes()
}

fn snapshot() -> Vec<u8> {
    let mut memory = vec![0u8; 2 * PAGE_SIZE];
    let mut place = |address: usize, bytes: &[u8]| {
        memory[address..address + bytes.len()].copy_from_slice(bytes);
    };
    place(TTY, b"TTY:");
    place(INPUT, b"input.tex");
    place(OUTPUT, b"input.dvi");
    place(LOG, b"input.log");
    place(DONE, b"\x05Done.");
    place(FONT, b"TeXfonts:cmr10.tfm");
    place(MISSING, b"missing.sty");
    memory
}

fn artifacts(body: &str) -> Artifacts {
    Artifacts::new(module(body), snapshot())
}

fn config() -> SessionConfig {
    SessionConfig {
        memory_pages: 2,
        scratch_pages: 1,
        completion_timeout: Duration::from_secs(30),
        ..Default::default()
    }
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

/// Renders the output as text inside an unterminated wrapper
struct TextRenderer;

#[async_trait]
impl Renderer for TextRenderer {
    async fn render(&self, output: &[u8]) -> Result<String, RenderError> {
        Ok(format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\"><text>{}</text>",
            String::from_utf8_lossy(output).trim()
        ))
    }
}

#[tokio::test]
async fn test_typeset_round_trip() {
    let mut session = Session::new(config()).unwrap();
    session.load(&artifacts(TYPESET), "\\draw (0,0);").unwrap();
    assert_eq!(session.state(), LifecycleState::Loaded);

    let reason = session.run().await.unwrap();
    assert_eq!(reason, CompletionReason::FinalEnd);
    assert_eq!(session.state(), LifecycleState::Finished);
    assert_eq!(session.completion(), Some(CompletionReason::FinalEnd));

    let output = session.read_output().unwrap();
    assert_eq!(
        output,
        b"\\begin{document}\n\\draw (0,0);\n\\end{document}\n"
    );

    let log = session.read_log().unwrap();
    assert_eq!(log, " input.tex\nDone.");
    assert!(diagnostics::extract(&log).is_empty());
}

#[tokio::test]
async fn test_render_balances_wrapper() {
    let mut session = Session::new(config()).unwrap();
    session.load(&artifacts(TYPESET), "hello").unwrap();
    session.run().await.unwrap();

    let document = session.render(&TextRenderer).await.unwrap();
    assert!(document.starts_with("<svg "));
    assert!(document.ends_with("</text></svg>"));
    assert!(document.contains("hello"));
}

#[tokio::test]
async fn test_reload_does_not_leak_files() {
    let mut session = Session::new(config()).unwrap();

    session.load(&artifacts(TYPESET), "first run").unwrap();
    session.run().await.unwrap();
    let first = session.read_output().unwrap();
    assert!(String::from_utf8_lossy(&first).contains("first run"));

    session.teardown().unwrap();
    assert_eq!(session.state(), LifecycleState::TornDown);
    assert!(session.read_output().is_err());
    session.reset().unwrap();

    session.load(&artifacts(TYPESET), "second").unwrap();
    session.run().await.unwrap();
    let second = String::from_utf8(session.read_output().unwrap()).unwrap();
    assert!(second.contains("second"));
    assert!(!second.contains("first run"));
}

#[tokio::test]
async fn test_terminal_exhaustion_completes_run() {
    let mut session = Session::new(config()).unwrap();
    session.load(&artifacts(DRAIN_TERMINAL), "").unwrap();
    assert_eq!(
        session.run().await.unwrap(),
        CompletionReason::InputExhausted
    );
}

#[tokio::test]
async fn test_return_without_signal() {
    let mut session = Session::new(config()).unwrap();
    session.load(&artifacts(SILENT), "").unwrap();
    assert!(matches!(
        session.run().await,
        Err(SessionError::CompletionAbandoned)
    ));
    assert_eq!(session.state(), LifecycleState::Finished);
    session.teardown().unwrap();
}

#[tokio::test]
async fn test_missing_output_is_fatal() {
    let mut session = Session::new(config()).unwrap();
    session.load(&artifacts(FINAL_END_ONLY), "x").unwrap();
    session.run().await.unwrap();

    assert!(matches!(
        session.read_output(),
        Err(SessionError::OutputMissing(name)) if name == "input.dvi"
    ));
    assert!(matches!(
        session.render(&TextRenderer).await,
        Err(SessionError::OutputMissing(_))
    ));
}

#[tokio::test]
async fn test_resources_and_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("cmr10.tfm.gz"), gzip(b"metrics")).unwrap();

    let mut session = Session::new(config())
        .unwrap()
        .with_resources(Arc::new(DirectoryStore::new(dir.path())));
    session.load(&artifacts(RESOURCES), "").unwrap();
    session.run().await.unwrap();

    assert_eq!(session.read_output().unwrap(), b"metrics");
    assert_eq!(session.read_log().unwrap(), "1");
}

#[tokio::test]
async fn test_clock_is_injectable() {
    let mut session = Session::new(config())
        .unwrap()
        .with_clock(FixedClock::at(1982, 12, 3, 13, 45).unwrap());
    session.load(&artifacts(CLOCK), "").unwrap();

    assert_eq!(session.run().await.unwrap(), CompletionReason::FinalEnd);
    assert_eq!(session.read_log().unwrap(), "1982/12");
}

#[tokio::test]
async fn test_watchdog_interrupts_spinning_module() {
    let mut session = Session::new(SessionConfig {
        completion_timeout: Duration::from_millis(200),
        ..config()
    })
    .unwrap();
    session.load(&artifacts(SPIN), "").unwrap();

    assert!(matches!(
        session.run().await,
        Err(SessionError::CompletionTimeout(_))
    ));
    assert_eq!(session.state(), LifecycleState::Finished);
    session.teardown().unwrap();
}

#[tokio::test]
async fn test_fuel_limit() {
    let mut session = Session::new(SessionConfig {
        fuel_limit: Some(100_000),
        ..config()
    })
    .unwrap();
    session.load(&artifacts(SPIN), "").unwrap();

    let error = session.run().await.unwrap_err();
    assert!(matches!(error, SessionError::FuelExhausted));
    assert!(error.is_runtime_failure());
}

#[tokio::test]
async fn test_bad_address_traps() {
    let mut session = Session::new(config()).unwrap();
    session.load(&artifacts(WILD_POINTER), "").unwrap();

    let error = session.run().await.unwrap_err();
    assert!(matches!(error, SessionError::Execution(_)));
    assert!(format!("{:?}", error).contains("out of bounds"));
}

#[tokio::test]
async fn test_full_memory_snapshot_loads() {
    // Data in the scratch range is replaced by the staged terminal script
    let mut memory = snapshot();
    memory[PAGE_SIZE..].fill(0xAA);

    let mut session = Session::new(config()).unwrap();
    session
        .load(&Artifacts::new(module(TYPESET), memory), "x")
        .unwrap();
    assert_eq!(session.run().await.unwrap(), CompletionReason::FinalEnd);
    assert_eq!(session.read_log().unwrap(), " input.tex\nDone.");
}

#[test]
fn test_snapshot_size_must_match_memory() {
    for size in [0, 2048, PAGE_SIZE, 2 * PAGE_SIZE + 1] {
        let mut session = Session::new(config()).unwrap();
        let artifacts = Artifacts::new(module(SILENT), vec![0u8; size]);
        match session.load(&artifacts, "") {
            Err(SessionError::SnapshotSize { actual, expected }) => {
                assert_eq!(actual, size);
                assert_eq!(expected, 2 * PAGE_SIZE);
            }
            other => panic!("unexpected load result for {} bytes: {:?}", size, other),
        }
        assert_eq!(session.state(), LifecycleState::Idle);
    }
}

#[test]
fn test_load_requires_idle() {
    let mut session = Session::new(config()).unwrap();
    session.load(&artifacts(SILENT), "").unwrap();
    assert!(matches!(
        session.load(&artifacts(SILENT), ""),
        Err(SessionError::InvalidLifecycleState {
            found: LifecycleState::Loaded,
            ..
        })
    ));
}

#[test]
fn test_invalid_image() {
    let mut session = Session::new(config()).unwrap();
    let artifacts = Artifacts::new(b"not a module".to_vec(), snapshot());
    assert!(matches!(
        session.load(&artifacts, ""),
        Err(SessionError::ModuleCompilation(_))
    ));
}

#[tokio::test]
async fn test_compressed_artifacts_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("core.wasm.gz");
    let memory = dir.path().join("core.dump.gz");
    std::fs::write(&image, gzip(&module(TYPESET))).unwrap();
    std::fs::write(&memory, gzip(&snapshot())).unwrap();

    let artifacts = Artifacts::from_paths(&image, &memory).unwrap();
    let mut session = Session::new(config()).unwrap();
    session.load(&artifacts, "compressed").unwrap();
    session.run().await.unwrap();

    let output = String::from_utf8(session.read_output().unwrap()).unwrap();
    assert!(output.contains("compressed"));
}
