// Command-line behavior of the docmark binary

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use super::fixtures;

/// Config that keeps font lookup inside `font_dir` so runs are deterministic.
fn write_config(dir: &Path, font_dir: &Path) -> PathBuf {
    let path = dir.join("docmark.yaml");
    let yaml = format!(
        r#"
watermark:
  text: "${{DOCMARK_TEST_TEXT}}"
  opacity: 0.4
  position: diagonal
fonts:
  bundled_font: null
  fallback_families: []
  logical_families: []
  font_dirs:
    - "{}"
logging:
  format: json
  level: warn
"#,
        font_dir.display()
    );
    fs::write(&path, yaml).unwrap();
    path
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_docmark"))
        .args(args)
        .env("DOCMARK_TEST_TEXT", "CLI TEST")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn test_watermarks_files_into_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let fonts = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), fonts.path());
    let input = dir.path().join("report.pdf");
    fs::write(&input, fixtures::pdf(&[Some([0, 0, 612, 792])])).unwrap();
    let out_dir = dir.path().join("out");

    let output = run(&[
        input.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
        "--output-dir",
        out_dir.to_str().unwrap(),
        "--rotation",
        "-30",
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let written = fs::read(out_dir.join("watermarked_report.pdf")).unwrap();
    assert!(written.starts_with(b"%PDF-"));
    let leftovers: Vec<_> = fs::read_dir(&out_dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".partial"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_unsupported_input_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let fonts = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), fonts.path());
    let input = dir.path().join("legacy.doc");
    fs::write(&input, b"binary word document").unwrap();
    let out_dir = dir.path().join("out");

    let output = run(&[
        input.to_str().unwrap(),
        "-c",
        config.to_str().unwrap(),
        "-o",
        out_dir.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!out_dir.join("watermarked_legacy.doc").exists());
}

// Test: one bad file fails the run but the good one is still written
#[test]
fn test_partial_failure_still_writes_good_files() {
    let dir = tempfile::tempdir().unwrap();
    let fonts = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), fonts.path());
    let good = dir.path().join("good.pdf");
    let bad = dir.path().join("bad.pdf");
    fs::write(&good, fixtures::pdf(&[Some([0, 0, 200, 200])])).unwrap();
    fs::write(&bad, b"%PDF-1.7 truncated").unwrap();

    let output = run(&[
        good.to_str().unwrap(),
        bad.to_str().unwrap(),
        "-c",
        config.to_str().unwrap(),
        "-o",
        dir.path().to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(dir.path().join("watermarked_good.pdf").exists());
    assert!(!dir.path().join("watermarked_bad.pdf").exists());
}

#[test]
fn test_invalid_opacity_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scan.png");
    fs::write(&input, fixtures::png(8, 8, [0, 0, 0, 255])).unwrap();

    let output = run(&[
        input.to_str().unwrap(),
        "--opacity",
        "1.5",
        "-o",
        dir.path().to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(!dir.path().join("watermarked_scan.png").exists());
}
