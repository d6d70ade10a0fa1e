//! End-to-end tests driving the `pact` binary through tempdir configs:
//! ingest counts, idempotent re-ingestion, query degradation, report
//! structure, and exit codes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

fn pact_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("pact");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    fs::create_dir_all(root.join("config")).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let contracts_dir = root.join("contracts");
    fs::create_dir_all(&contracts_dir).unwrap();
    fs::write(
        contracts_dir.join("lease.txt"),
        "Office Lease Agreement\n\nCompany: Acme Corporation\nAddress: 123 Main Street\n\n\
         This lease remains in force until its stated end.\nExpiration Date: 12/31/2024\n",
    )
    .unwrap();
    fs::write(
        contracts_dir.join("msa.txt"),
        "Master Services Agreement\n\nCompany: Acme Corporation\nAddress: 456 Oak Avenue\n\n\
         Either party may terminate with notice.\nTermination Date: 12-20-2024\n",
    )
    .unwrap();

    let config_content = format!(
        r#"[index]
path = "{}/data/index.sqlite"

[chunking]
max_chars = 800
overlap_chars = 100

[retrieval]
top_k = 5

[report]
window_days = 30
"#,
        root.display()
    );

    let config_path = root.join("config").join("pact.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_pact(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = pact_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run pact binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn contracts_dir(config_path: &Path) -> String {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("contracts")
        .display()
        .to_string()
}

/// Minimal DOCX: a ZIP holding word/document.xml with `w:t` runs.
fn minimal_docx_with_text(phrase: &str) -> Vec<u8> {
    use std::io::Write;
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
            phrase
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

/// Minimal one-page PDF containing `phrase`, with a correct xref table so
/// the extractor can parse it.
fn minimal_pdf_with_phrase(phrase: &str) -> Vec<u8> {
    let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET\n", phrase);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}endstream endobj\n",
            stream.len(),
            stream
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

#[test]
fn init_creates_index_and_is_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_pact(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Index initialized"));

    let (_, _, success2) = run_pact(&config_path, &["init"]);
    assert!(success2, "second init failed (not idempotent)");
}

#[test]
fn ingest_reports_document_and_chunk_counts() {
    let (_tmp, config_path) = setup_test_env();
    run_pact(&config_path, &["init"]);

    let dir = contracts_dir(&config_path);
    let (stdout, stderr, success) = run_pact(&config_path, &["ingest", &dir]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("documents processed: 2"));
    assert!(stdout.contains("ok"));
}

#[test]
fn ingest_skips_corrupt_and_unsupported_files() {
    let (_tmp, config_path) = setup_test_env();
    run_pact(&config_path, &["init"]);

    let dir = contracts_dir(&config_path);
    fs::write(Path::new(&dir).join("broken.pdf"), b"not a pdf").unwrap();
    fs::write(Path::new(&dir).join("notes.md"), "unsupported format").unwrap();

    let (stdout, _, success) = run_pact(&config_path, &["ingest", &dir]);
    assert!(success);
    assert!(stdout.contains("documents processed: 2"));
}

#[test]
fn reingestion_is_idempotent() {
    let (_tmp, config_path) = setup_test_env();
    run_pact(&config_path, &["init"]);
    let dir = contracts_dir(&config_path);

    run_pact(&config_path, &["ingest", &dir]);
    let (status_before, _, _) = run_pact(&config_path, &["status"]);

    run_pact(&config_path, &["ingest", &dir]);
    let (status_after, _, _) = run_pact(&config_path, &["status"]);

    assert_eq!(status_before, status_after);
    assert!(status_after.contains("documents: 2"));
}

#[test]
fn ingest_of_empty_directory_reports_no_documents() {
    let (tmp, config_path) = setup_test_env();
    run_pact(&config_path, &["init"]);

    let empty = tmp.path().join("empty");
    fs::create_dir_all(&empty).unwrap();

    let (stdout, _, success) = run_pact(&config_path, &["ingest", empty.to_str().unwrap()]);
    assert!(success, "empty ingest should not be an error");
    assert!(stdout.contains("No documents processed."));
}

#[test]
fn ingest_without_init_fails_with_hint() {
    let (_tmp, config_path) = setup_test_env();

    let dir = contracts_dir(&config_path);
    let (_, stderr, success) = run_pact(&config_path, &["ingest", &dir]);
    assert!(!success);
    assert!(stderr.contains("pact init"), "stderr: {}", stderr);
}

#[test]
fn docx_files_are_ingested() {
    let (_tmp, config_path) = setup_test_env();
    run_pact(&config_path, &["init"]);

    let dir = contracts_dir(&config_path);
    fs::write(
        Path::new(&dir).join("sow.docx"),
        minimal_docx_with_text("Statement of Work for Globex"),
    )
    .unwrap();

    let (stdout, _, success) = run_pact(&config_path, &["ingest", &dir]);
    assert!(success);
    assert!(stdout.contains("documents processed: 3"));
}

#[test]
fn pdf_files_are_ingested() {
    let (_tmp, config_path) = setup_test_env();
    run_pact(&config_path, &["init"]);

    let dir = contracts_dir(&config_path);
    fs::write(
        Path::new(&dir).join("nda.pdf"),
        minimal_pdf_with_phrase("Mutual nondisclosure agreement"),
    )
    .unwrap();

    let (stdout, stderr, success) = run_pact(&config_path, &["ingest", &dir]);
    assert!(success, "stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("documents processed: 3"));
}

#[test]
fn query_degrades_to_fixed_answer_without_backends() {
    let (_tmp, config_path) = setup_test_env();
    run_pact(&config_path, &["init"]);
    let dir = contracts_dir(&config_path);
    run_pact(&config_path, &["ingest", &dir]);

    let (stdout, _, success) = run_pact(&config_path, &["query", "When does the lease expire?"]);
    assert!(success, "query must never surface a raw fault");
    assert!(stdout.contains("Sorry, I encountered an error while processing your query."));
    assert!(!stdout.contains("Sources:"));
}

#[test]
fn report_lists_expirations_and_conflicts() {
    let (_tmp, config_path) = setup_test_env();
    run_pact(&config_path, &["init"]);
    let dir = contracts_dir(&config_path);
    run_pact(&config_path, &["ingest", &dir]);

    let (stdout, stderr, success) =
        run_pact(&config_path, &["report", "--as-of", "2024-12-15"]);
    assert!(success, "stdout={}, stderr={}", stdout, stderr);

    assert!(stdout.contains("APPROACHING CONTRACT EXPIRATIONS"));
    assert!(stdout.contains("CONFLICTS DETECTED"));
    assert!(stdout.contains("lease.txt: Expires on 2024-12-31 (16 days)"));
    assert!(stdout.contains("msa.txt: Expires on 2024-12-20 (5 days)"));
    assert!(stdout.contains("Company: acme corporation"));
    assert!(stdout.contains("Address '123 main street' found in: lease.txt"));
    assert!(stdout.contains("Address '456 oak avenue' found in: msa.txt"));
}

#[test]
fn report_on_empty_corpus_has_explicit_none_lines() {
    let (_tmp, config_path) = setup_test_env();
    run_pact(&config_path, &["init"]);

    let (stdout, _, success) = run_pact(&config_path, &["report"]);
    assert!(success);
    assert!(stdout.contains("APPROACHING CONTRACT EXPIRATIONS"));
    assert!(stdout.contains("No contracts expiring in the next 30 days."));
    assert!(stdout.contains("CONFLICTS DETECTED"));
    assert!(stdout.contains("No conflicts detected."));
}

#[test]
fn report_outside_window_is_empty() {
    let (_tmp, config_path) = setup_test_env();
    run_pact(&config_path, &["init"]);
    let dir = contracts_dir(&config_path);
    run_pact(&config_path, &["ingest", &dir]);

    // Both fixture dates are more than 30 days out from this pin.
    let (stdout, _, success) = run_pact(&config_path, &["report", "--as-of", "2024-10-01"]);
    assert!(success);
    assert!(stdout.contains("No contracts expiring in the next 30 days."));
}

#[test]
fn report_delivery_without_config_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_pact(&config_path, &["init"]);

    let (_, stderr, success) = run_pact(&config_path, &["report", "--deliver"]);
    assert!(!success);
    assert!(stderr.contains("delivery"), "stderr: {}", stderr);
}

#[test]
fn report_without_index_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success) = run_pact(&config_path, &["report"]);
    assert!(!success, "report without an index must exit non-zero");
}

#[test]
fn status_distinguishes_missing_index_from_empty_corpus() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_pact(&config_path, &["status"]);
    assert!(success);
    assert!(stdout.contains("No index present"));

    run_pact(&config_path, &["init"]);
    let (stdout, _, success) = run_pact(&config_path, &["status"]);
    assert!(success);
    assert!(stdout.contains("documents: 0"));
    assert!(stdout.contains("chunks: 0"));
}
