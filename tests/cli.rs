use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn bin_path() -> &'static str {
    env!("CARGO_BIN_EXE_aws-cost-report")
}

fn run_cmd(home: &TempDir, args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .env("AWS_COST_REPORT_HOME", home.path())
        .env_remove("AWS_MARGIN")
        .env_remove("RUST_LOG")
        .output()
        .expect("run aws-cost-report command")
}

fn config_path(home: &TempDir) -> PathBuf {
    home.path().join("config").join("config.toml")
}

fn write_config(home: &TempDir, raw: &str) {
    let path = config_path(home);
    fs::create_dir_all(path.parent().unwrap_or(Path::new("."))).expect("create config dir");
    fs::write(path, raw).expect("write config");
}

#[test]
fn init_creates_default_config() {
    let home = TempDir::new().expect("temp home");
    let output = run_cmd(&home, &["init"]);
    assert!(output.status.success());

    let raw = fs::read_to_string(config_path(&home)).expect("config written");
    assert!(raw.contains("region = \"us-east-1\""));
    assert!(raw.contains("UnblendedCost"));
    assert!(raw.contains("SERVICE"));
}

#[test]
fn init_is_idempotent() {
    let home = TempDir::new().expect("temp home");

    assert!(run_cmd(&home, &["init"]).status.success());
    let first = fs::read_to_string(config_path(&home)).expect("read config after first init");

    assert!(run_cmd(&home, &["init"]).status.success());
    let second = fs::read_to_string(config_path(&home)).expect("read config after second init");

    assert_eq!(first, second);
}

#[test]
fn init_keeps_an_existing_config() {
    let home = TempDir::new().expect("temp home");
    write_config(&home, "region = \"eu-central-1\"\n");

    assert!(run_cmd(&home, &["init"]).status.success());
    let raw = fs::read_to_string(config_path(&home)).expect("read config");
    assert_eq!(raw, "region = \"eu-central-1\"\n");
}

#[test]
fn report_rejects_unknown_granularity() {
    let home = TempDir::new().expect("temp home");
    let output = run_cmd(&home, &["report", "--granularity", "HOURLY"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unsupported granularity"));
}

#[test]
fn report_rejects_unknown_group_by() {
    let home = TempDir::new().expect("temp home");
    let output = run_cmd(&home, &["report", "--group-by", "planet"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unsupported group-by"));
}

#[test]
fn report_rejects_malformed_as_of_date() {
    let home = TempDir::new().expect("temp home");
    let output = run_cmd(&home, &["report", "--as-of", "yesterday"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Use YYYY-MM-DD"));
}

#[test]
fn report_rejects_config_without_metrics() {
    let home = TempDir::new().expect("temp home");
    write_config(&home, "metrics = []\n");

    let output = run_cmd(&home, &["report"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("At least one metric is required"));
}

#[test]
fn report_rejects_unparseable_config_file() {
    let home = TempDir::new().expect("temp home");
    write_config(&home, "granularity = \"WEEKLY\"\n");

    let output = run_cmd(&home, &["report"]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn bare_invocation_validates_report_flags() {
    let home = TempDir::new().expect("temp home");
    let output = run_cmd(&home, &["--group-by", "planet"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unsupported group-by"));
}

#[test]
fn report_without_credentials_exits_before_output() {
    let home = TempDir::new().expect("temp home");
    let missing = home.path().join("missing");
    let output = Command::new(bin_path())
        .args(["report", "--as-of", "2025-05-14"])
        .env("AWS_COST_REPORT_HOME", home.path())
        .env("AWS_CONFIG_FILE", &missing)
        .env("AWS_SHARED_CREDENTIALS_FILE", &missing)
        .env("AWS_EC2_METADATA_DISABLED", "true")
        .env("AWS_REGION", "us-east-1")
        .env_remove("AWS_ACCESS_KEY_ID")
        .env_remove("AWS_SECRET_ACCESS_KEY")
        .env_remove("AWS_SESSION_TOKEN")
        .env_remove("AWS_PROFILE")
        .env_remove("AWS_WEB_IDENTITY_TOKEN_FILE")
        .env_remove("AWS_ROLE_ARN")
        .env_remove("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI")
        .env_remove("AWS_CONTAINER_CREDENTIALS_FULL_URI")
        .env_remove("AWS_MARGIN")
        .env_remove("RUST_LOG")
        .output()
        .expect("run aws-cost-report command");

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Credentials"));
}
