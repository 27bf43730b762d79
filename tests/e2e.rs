//! End-to-end tests against the real converters.
//!
//! These need an OFD → PDF tool on `PATH` (or `OFD2DOCX_STAGE1_CMD`), PDFium
//! and LibreOffice, plus sample documents in `./test_cases/ofds/`. They are
//! gated behind `E2E_ENABLED` so they do not run in CI unless requested.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=./libpdfium.so cargo test --test e2e -- --nocapture

use ofd2docx::{convert_batch, BatchConfig, ConversionMode, ConverterOptions};
use std::io::Read;
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/ofds")
}

/// Skip this test unless E2E_ENABLED is set and sample documents exist.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let dir = test_cases_dir();
        if !dir.is_dir() {
            println!("SKIP: no sample documents in {}", dir.display());
            return;
        }
        dir
    }};
}

fn options() -> ConverterOptions {
    let mut options = ConverterOptions::default();
    if let Ok(cmd) = std::env::var("OFD2DOCX_STAGE1_CMD") {
        options.stage1_program = cmd;
    }
    options
}

async fn run_mode(mode: ConversionMode) -> (tempfile::TempDir, ofd2docx::BatchSummary) {
    let input = test_cases_dir();
    let out = tempfile::TempDir::new().unwrap();
    let config = BatchConfig::builder()
        .input_dir(&input)
        .output_dir(out.path())
        .mode(mode)
        .build()
        .unwrap();

    let summary = convert_batch(&config, &options())
        .await
        .unwrap_or_else(|e| panic!("[{mode}] batch failed: {e}"));
    println!("[{mode}]\n{summary}");
    (out, summary)
}

fn leftover_intermediates(dir: &std::path::Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().is_some_and(|e| e == "pdf"))
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn e2e_text_mode() {
    let _ = e2e_skip_unless_ready!();
    let (out, summary) = run_mode(ConversionMode::Text).await;

    assert!(summary.succeeded > 0, "nothing converted");
    assert!(leftover_intermediates(out.path()).is_empty());
    for entry in std::fs::read_dir(out.path()).unwrap() {
        let path = entry.unwrap().path();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains(' '), "{} still has spaces", path.display());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_layout_mode_produces_docx_packages() {
    let _ = e2e_skip_unless_ready!();
    let (out, summary) = run_mode(ConversionMode::Layout).await;

    assert!(summary.succeeded > 0, "nothing converted");
    assert!(leftover_intermediates(out.path()).is_empty());
    for entry in std::fs::read_dir(out.path()).unwrap() {
        let path = entry.unwrap().path();
        let file = std::fs::File::open(&path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut doc = String::new();
        archive
            .by_name("word/document.xml")
            .unwrap()
            .read_to_string(&mut doc)
            .unwrap();
        assert!(doc.contains("<wp:inline"), "{} has no page images", path.display());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_libreoffice_mode() {
    let _ = e2e_skip_unless_ready!();
    let (out, summary) = run_mode(ConversionMode::External).await;

    assert_eq!(summary.succeeded + summary.failed, summary.total());
    assert!(leftover_intermediates(out.path()).is_empty());
}
