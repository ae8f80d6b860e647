//! Integration tests for the quillpdf CLI

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{tempdir, TempDir};

/// Test helper to get the CLI binary path
fn get_cli_path() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // Remove test binary name
    if path.ends_with("deps") {
        path.pop(); // Remove "deps" directory
    }
    path.push("quillpdf");
    #[cfg(windows)]
    path.set_extension("exe");
    path
}

fn setup_temp_dir() -> TempDir {
    tempdir().expect("Failed to create temp directory")
}

fn run_cli_command(args: &[&str]) -> Result<std::process::Output> {
    let output = Command::new(get_cli_path()).args(args).output()?;
    Ok(output)
}

/// A minimal well-formed file for the inspection commands.
fn write_fixture(path: &Path) {
    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(b"%PDF-1.7\n");
    let offset1 = out.len();
    out.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
    let offset2 = out.len();
    out.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n");
    let xref = out.len();
    out.extend_from_slice(
        format!(
            "xref\n0 3\n0000000000 65535 f \n{offset1:010} 00000 n \n{offset2:010} 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n"
        )
        .as_bytes(),
    );
    fs::write(path, out).expect("writing fixture");
}

#[test]
fn test_cli_info_command() {
    let temp_dir = setup_temp_dir();
    let input = temp_dir.path().join("fixture.pdf");
    write_fixture(&input);

    let output = run_cli_command(&["info", input.to_str().unwrap()]).unwrap();
    assert!(output.status.success(), "info failed: {output:?}");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("PDF 1.7"));
    assert!(stdout.contains("1 0 R"));
}

#[test]
fn test_cli_objects_command() {
    let temp_dir = setup_temp_dir();
    let input = temp_dir.path().join("fixture.pdf");
    write_fixture(&input);

    let output = run_cli_command(&["objects", input.to_str().unwrap()]).unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("dictionary /Catalog"));
    assert!(stdout.contains("dictionary /Pages"));
}

#[test]
fn test_cli_rewrite_round_trips() {
    let temp_dir = setup_temp_dir();
    let input = temp_dir.path().join("fixture.pdf");
    let rewritten = temp_dir.path().join("rewritten.pdf");
    write_fixture(&input);

    let output = run_cli_command(&[
        "rewrite",
        input.to_str().unwrap(),
        "--output",
        rewritten.to_str().unwrap(),
    ])
    .unwrap();
    assert!(output.status.success(), "rewrite failed: {output:?}");

    let content = fs::read(&rewritten).expect("rewritten file");
    assert!(content.starts_with(b"%PDF-1.7"));
    assert!(content.ends_with(b"%%EOF\n"));

    // The rewritten file parses again
    let output = run_cli_command(&["info", rewritten.to_str().unwrap()]).unwrap();
    assert!(output.status.success());
}

#[test]
fn test_cli_missing_file_fails() {
    let output = run_cli_command(&["info", "/no/such/file.pdf"]).unwrap();
    assert!(!output.status.success());
}
