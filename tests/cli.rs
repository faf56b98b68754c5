use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn cyberguard_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("cyberguard");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Oracle, speech and SMTP stay disabled so nothing leaves the machine.
    let config_content = format!(
        r#"[db]
path = "{}/data/cyberguard.sqlite"

[server]
bind = "127.0.0.1:7331"
"#,
        root.display()
    );

    let config_path = config_dir.join("cyberguard.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn write_form(root: &Path, body: &str) -> PathBuf {
    let path = root.join("complaint.toml");
    fs::write(&path, body).unwrap();
    path
}

const COMPLETE_FORM: &str = r#"
name_phone = "Asha Rao 9876543210"
email = ""
incident_date = "12-03-2025 14:30"
financial_scam = "YES"
incident_description = "A caller posing as my bank asked for the OTP and emptied my account."
evidence = "Call log screenshot"
"#;

fn run_cyberguard(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = cyberguard_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run cyberguard binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn ticket_from(stdout: &str) -> String {
    stdout
        .lines()
        .find_map(|l| l.trim().strip_prefix("Ticket ID:"))
        .map(|t| t.trim().to_string())
        .unwrap_or_else(|| panic!("no ticket in output: {}", stdout))
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_cyberguard(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/cyberguard.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_cyberguard(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_cyberguard(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_languages_without_config() {
    let (stdout, stderr, success) =
        run_cyberguard(Path::new("/nonexistent/cyberguard.toml"), &["languages"]);
    assert!(success, "languages failed: {}", stderr);
    assert_eq!(stdout.lines().count(), 23);
    assert!(stdout.contains("Hindi"));
    assert!(stdout.contains("ta-IN"));
}

#[test]
fn test_file_track_and_stats() {
    let (tmp, config_path) = setup_test_env();
    let form = write_form(tmp.path(), COMPLETE_FORM);

    let (stdout, stderr, success) =
        run_cyberguard(&config_path, &["file", form.to_str().unwrap()]);
    assert!(success, "file failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Complaint filed."));
    // No oracle configured: categorization degrades to the fallback.
    assert!(stdout.contains("Category:    Other"));
    assert!(stdout.contains("Status:      Under Investigation"));

    let ticket = ticket_from(&stdout);
    assert!(ticket.starts_with("CYBER-"));

    let pdf = tmp.path().join("report.pdf");
    let lower = ticket.to_lowercase();
    let (stdout, stderr, success) = run_cyberguard(
        &config_path,
        &["track", &lower, "--pdf", pdf.to_str().unwrap()],
    );
    assert!(success, "track failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains(&ticket));
    assert!(stdout.contains("Under Investigation"));
    assert!(fs::read(&pdf).unwrap().starts_with(b"%PDF"));

    let (stdout, _, success) = run_cyberguard(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Total:     1"));
    assert!(stdout.contains("Active:    1"));
    assert!(stdout.contains("Resolved:  0"));
}

#[test]
fn test_file_rejects_missing_required_fields() {
    let (tmp, config_path) = setup_test_env();
    let form = write_form(tmp.path(), "name_phone = \"Asha\"\nfinancial_scam = \"yes\"\n");

    let (_, stderr, success) = run_cyberguard(&config_path, &["file", form.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("email"), "stderr: {}", stderr);
    assert!(stderr.contains("incident_description"), "stderr: {}", stderr);
}

#[test]
fn test_file_rejects_invalid_yes_no() {
    let (tmp, config_path) = setup_test_env();
    let form = write_form(
        tmp.path(),
        &COMPLETE_FORM.replace("financial_scam = \"YES\"", "financial_scam = \"perhaps\""),
    );

    let (_, stderr, success) = run_cyberguard(&config_path, &["file", form.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("financial_scam"), "stderr: {}", stderr);
}

#[test]
fn test_track_unknown_ticket_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_cyberguard(&config_path, &["track", "CYBER-00000000"]);
    assert!(!success);
    assert!(stderr.contains("No complaint found"), "stderr: {}", stderr);
}

#[test]
fn test_intake_abandoned_on_eof() {
    use std::io::Write;
    use std::process::Stdio;

    let (_tmp, config_path) = setup_test_env();
    let mut child = Command::new(cyberguard_binary())
        .arg("--config")
        .arg(&config_path)
        .arg("intake")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"Asha 98765\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("What is your full name and contact phone number?"));
    assert!(stdout.contains("What is your email address?"));
    assert!(stdout.contains("nothing was saved"));
}
