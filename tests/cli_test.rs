use std::fs;
use std::path::Path;
use std::process::Command;

const CONFIG_VARS: [&str; 4] = [
    "MD2PDF_MAX_INPUT_SIZE",
    "MD2PDF_ALLOW_OVERWRITE",
    "MD2PDF_BASE_DIR",
    "MD2PDF_ALLOW_OUTSIDE_BASE",
];

/// Run the pre-built md2pdf binary in `dir` with only the given
/// configuration variables set.
fn run_md2pdf(dir: &Path, args: &[&str], env: &[(&str, &str)]) -> (String, String, i32) {
    let bin = std::path::PathBuf::from(env!("CARGO_BIN_EXE_md2pdf"));

    let mut command = Command::new(&bin);
    command.args(args).current_dir(dir).env_remove("RUST_LOG");
    for var in CONFIG_VARS {
        command.env_remove(var);
    }
    for (key, value) in env {
        command.env(key, value);
    }
    let output = command.output().expect("Failed to execute md2pdf");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.code().unwrap_or(-1))
}

fn markdown_of_size(len: usize) -> String {
    let mut md = String::from("# Notes\n\n");
    while md.len() < len {
        md.push_str("Some text. ");
    }
    md.truncate(len);
    md
}

#[test]
fn test_default_output_next_to_input() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("notes.md"), markdown_of_size(500)).unwrap();

    let (stdout, stderr, code) = run_md2pdf(dir.path(), &["notes.md"], &[]);
    assert_eq!(code, 0, "stderr: {}", stderr);
    assert!(stdout.starts_with("✓ PDF created successfully: "));
    assert!(stdout.trim_end().ends_with("notes.pdf"));
    assert_eq!(stdout.lines().count(), 1);

    let pdf = fs::read(dir.path().join("notes.pdf")).unwrap();
    assert!(pdf.starts_with(b"%PDF-1.4"));
}

#[test]
fn test_explicit_output_path() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("out")).unwrap();
    fs::write(dir.path().join("guide.markdown"), "# Guide\n\n- [ ] todo\n").unwrap();

    let (stdout, stderr, code) = run_md2pdf(dir.path(), &["guide.markdown", "out/guide.pdf"], &[]);
    assert_eq!(code, 0, "stderr: {}", stderr);
    assert!(stdout.contains("guide.pdf"));
    assert!(dir.path().join("out/guide.pdf").is_file());
}

#[test]
fn test_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, stderr, code) = run_md2pdf(dir.path(), &["missing.md"], &[]);
    assert_eq!(code, 1);
    assert!(stdout.is_empty());
    assert!(stderr.starts_with("Error: "));
    assert!(stderr.contains("missing.md"));
    assert!(stderr.contains("not found"));
}

#[test]
fn test_size_limit_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("big.md"), markdown_of_size(200)).unwrap();

    let (_, stderr, code) = run_md2pdf(dir.path(), &["big.md"], &[("MD2PDF_MAX_INPUT_SIZE", "100")]);
    assert_eq!(code, 1);
    assert!(stderr.contains("exceeds the maximum allowed size"));
    assert!(!dir.path().join("big.pdf").exists());
}

#[test]
fn test_invalid_size_setting() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("notes.md"), "# hi\n").unwrap();

    let (_, stderr, code) = run_md2pdf(dir.path(), &["notes.md"], &[("MD2PDF_MAX_INPUT_SIZE", "lots")]);
    assert_eq!(code, 1);
    assert!(stderr.contains("MD2PDF_MAX_INPUT_SIZE"));
}

#[test]
fn test_wrong_extension() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("notes.txt"), "# hi\n").unwrap();

    let (_, stderr, code) = run_md2pdf(dir.path(), &["notes.txt"], &[]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Markdown file"));
}

#[test]
fn test_overwrite_policy() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("notes.md"), "# hi\n").unwrap();
    fs::write(dir.path().join("notes.pdf"), "old").unwrap();

    let (_, stderr, code) = run_md2pdf(dir.path(), &["notes.md"], &[]);
    assert_eq!(code, 1);
    assert!(stderr.contains("already exists"));
    assert_eq!(fs::read(dir.path().join("notes.pdf")).unwrap(), b"old");

    let (_, stderr, code) = run_md2pdf(dir.path(), &["notes.md"], &[("MD2PDF_ALLOW_OVERWRITE", "1")]);
    assert_eq!(code, 0, "stderr: {}", stderr);
    assert!(fs::read(dir.path().join("notes.pdf")).unwrap().starts_with(b"%PDF"));
}

#[test]
fn test_missing_output_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("notes.md"), "# hi\n").unwrap();

    let (_, stderr, code) = run_md2pdf(
        dir.path(),
        &["notes.md", "nowhere/notes.pdf"],
        &[("MD2PDF_ALLOW_OVERWRITE", "1")],
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("does not exist"));
    assert!(!dir.path().join("nowhere").exists());
}

#[test]
fn test_relative_escape_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let work = dir.path().join("work");
    fs::create_dir(&work).unwrap();
    fs::write(dir.path().join("outside.md"), "# hi\n").unwrap();

    let (_, stderr, code) = run_md2pdf(&work, &["../outside.md"], &[]);
    assert_eq!(code, 1);
    assert!(stderr.contains("escapes the current working directory"));
}

#[test]
fn test_sandbox_root() {
    let dir = tempfile::tempdir().unwrap();
    let sandbox = dir.path().join("sandbox");
    fs::create_dir(&sandbox).unwrap();
    fs::write(dir.path().join("outside.md"), "# hi\n").unwrap();
    let outside = dir.path().join("outside.md");
    let outside = outside.to_str().unwrap();

    let (_, stderr, code) = run_md2pdf(dir.path(), &[outside], &[("MD2PDF_BASE_DIR", "sandbox")]);
    assert_eq!(code, 1);
    assert!(stderr.contains("outside the allowed base directory"));

    let (_, stderr, code) = run_md2pdf(
        dir.path(),
        &[outside],
        &[("MD2PDF_BASE_DIR", "sandbox"), ("MD2PDF_ALLOW_OUTSIDE_BASE", "1")],
    );
    assert_eq!(code, 0, "stderr: {}", stderr);
}

#[test]
fn test_usage_errors() {
    let dir = tempfile::tempdir().unwrap();

    let (stdout, stderr, code) = run_md2pdf(dir.path(), &[], &[]);
    assert_eq!(code, 1);
    assert!(stdout.is_empty());
    assert!(stderr.contains("Usage"));

    let (_, _, code) = run_md2pdf(dir.path(), &["a.md", "b.pdf", "extra"], &[]);
    assert_eq!(code, 1);

    let (stdout, _, code) = run_md2pdf(dir.path(), &["--help"], &[]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Usage"));

    let (stdout, _, code) = run_md2pdf(dir.path(), &["--version"], &[]);
    assert_eq!(code, 0);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}
