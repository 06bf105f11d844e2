use assert_cmd::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

/// Nothing listens here; any request that reaches DynamoDB fails fast.
const DEAD_ENDPOINT: &str = "http://127.0.0.1:9";

/// Helper to create a `lazydynamo` command with HOME in a temp dir and
/// dummy AWS credentials, so only the file cache can answer.
fn lazydynamo_cmd(home: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("lazydynamo");
    cmd.current_dir(home.path());
    cmd.env("HOME", home.path());
    cmd.env("NO_COLOR", "1");
    cmd.env("AWS_ACCESS_KEY_ID", "test");
    cmd.env("AWS_SECRET_ACCESS_KEY", "test");
    cmd.env("AWS_REGION", "us-east-1");
    cmd.env("AWS_EC2_METADATA_DISABLED", "true");
    cmd.env_remove("AWS_PROFILE");
    cmd.args(["--endpoint-url", DEAD_ENDPOINT]);
    cmd
}

fn cache_dir(home: &TempDir) -> std::path::PathBuf {
    home.path().join(".lazydynamo/cache")
}

fn write_record(path: &Path, data: &[&str], updated: chrono::DateTime<chrono::Utc>) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let record = serde_json::json!({
        "data": data,
        "updated": updated.to_rfc3339(),
    });
    std::fs::write(path, serde_json::to_vec(&record).unwrap()).unwrap();
}

/// Fresh cache with two tables and three Orders rows
///
/// Background refreshes against the dead endpoint give up after one attempt.
fn seed_cache(home: &TempDir) {
    let now = chrono::Utc::now();
    let dir = cache_dir(home);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        home.path().join(".lazydynamo/config.toml"),
        "max_attempts = 1\n",
    )
    .unwrap();
    write_record(&dir.join("collections.json"), &["Orders", "Users"], now);
    write_record(
        &dir.join("tables/Orders.json"),
        &[
            r#"{"customer_id":"c1","order_id":"o1","total":"10.50"}"#,
            r#"{"customer_id":"c1","order_id":"o2","total":"3"}"#,
            r#"{"customer_id":"c2","order_id":"o3","note":"gift, wrapped"}"#,
        ],
        now,
    );
}

// ============================================================================
// Argument handling
// ============================================================================

#[test]
fn version_flag() {
    cargo_bin_cmd!("lazydynamo")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lazydynamo"));
}

#[test]
fn help_flag() {
    cargo_bin_cmd!("lazydynamo")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Terminal browser for DynamoDB tables"))
        .stdout(predicate::str::contains("tables"))
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("cache"));
}

#[test]
fn verbose_quiet_conflict() {
    cargo_bin_cmd!("lazydynamo")
        .args(["--verbose", "--quiet", "tables"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn invalid_segments_rejected() {
    cargo_bin_cmd!("lazydynamo")
        .args(["scan", "Orders", "--segments", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--segments"));
}

// ============================================================================
// Served from a fresh cache
// ============================================================================

#[test]
fn tables_from_cache() {
    let home = TempDir::new().unwrap();
    seed_cache(&home);
    lazydynamo_cmd(&home)
        .arg("tables")
        .assert()
        .success()
        .stdout("Orders\nUsers\n");
}

#[test]
fn tables_fuzzy_filter() {
    let home = TempDir::new().unwrap();
    seed_cache(&home);
    lazydynamo_cmd(&home)
        .args(["tables", "--filter", "rs"])
        .assert()
        .success()
        .stdout("Orders\nUsers\n");
    lazydynamo_cmd(&home)
        .args(["tables", "-f", "odr"])
        .assert()
        .success()
        .stdout("Orders\n");
    lazydynamo_cmd(&home)
        .args(["tables", "-f", "zzz"])
        .assert()
        .success()
        .stdout("")
        .stderr(predicate::str::contains("No tables match 'zzz'"));
}

#[test]
fn scan_lines_from_cache() {
    let home = TempDir::new().unwrap();
    seed_cache(&home);
    lazydynamo_cmd(&home)
        .args(["scan", "Orders"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            r#"{"customer_id":"c1","order_id":"o1","total":"10.50"}"#,
        ))
        .stdout(predicate::function(|out: &str| out.lines().count() == 3));
}

#[test]
fn scan_csv_from_cache() {
    let home = TempDir::new().unwrap();
    seed_cache(&home);
    lazydynamo_cmd(&home)
        .args(["scan", "Orders", "--format", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("customer_id,order_id,total,note\n"))
        .stdout(predicate::str::contains(r#"c2,o3,,"gift, wrapped""#));
}

#[test]
fn scan_inspect_row() {
    let home = TempDir::new().unwrap();
    seed_cache(&home);
    lazydynamo_cmd(&home)
        .args(["scan", "Orders", "--inspect", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("  \"order_id\": \"o2\""));

    lazydynamo_cmd(&home)
        .args(["scan", "Orders", "--inspect", "7"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn scan_unknown_table() {
    let home = TempDir::new().unwrap();
    seed_cache(&home);
    lazydynamo_cmd(&home)
        .args(["scan", "Missing"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("table 'Missing' not found"))
        .stderr(predicate::str::contains("lazydynamo tables"));
}

#[test]
fn stale_cache_with_unreachable_service_fails() {
    let home = TempDir::new().unwrap();
    let old = chrono::Utc::now() - chrono::Duration::hours(100);
    write_record(&cache_dir(&home).join("collections.json"), &["Orders"], old);
    std::fs::write(
        home.path().join(".lazydynamo/config.toml"),
        "max_attempts = 1\n",
    )
    .unwrap();

    lazydynamo_cmd(&home)
        .arg("tables")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error:"));

    // The stale record is left as it was
    let raw = std::fs::read_to_string(cache_dir(&home).join("collections.json")).unwrap();
    assert!(raw.contains("Orders"));
}

// ============================================================================
// Cache and config maintenance
// ============================================================================

#[test]
fn cache_list_empty() {
    let home = TempDir::new().unwrap();
    lazydynamo_cmd(&home)
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cache is empty."));
}

#[test]
fn cache_list_and_clear() {
    let home = TempDir::new().unwrap();
    seed_cache(&home);

    lazydynamo_cmd(&home)
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(tables)"))
        .stdout(predicate::str::contains("Orders"))
        .stdout(predicate::str::contains("fresh"));

    lazydynamo_cmd(&home)
        .args(["cache", "clear", "--table", "Orders"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1 cache entry"));
    assert!(!cache_dir(&home).join("tables/Orders.json").exists());
    assert!(cache_dir(&home).join("collections.json").exists());

    lazydynamo_cmd(&home)
        .args(["cache", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1 cache entry"));
    assert!(!cache_dir(&home).join("collections.json").exists());
}

#[test]
fn cache_path_honours_override() {
    let home = TempDir::new().unwrap();
    let custom = home.path().join("elsewhere");
    lazydynamo_cmd(&home)
        .args(["cache", "path", "--cache-dir"])
        .arg(&custom)
        .assert()
        .success()
        .stdout(predicate::str::contains("elsewhere"));
}

#[test]
fn config_show_reflects_file_and_flags() {
    let home = TempDir::new().unwrap();
    std::fs::create_dir_all(home.path().join(".lazydynamo")).unwrap();
    std::fs::write(
        home.path().join(".lazydynamo/config.toml"),
        "region = \"eu-west-1\"\npage_size = 25\n",
    )
    .unwrap();

    lazydynamo_cmd(&home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("region = eu-west-1"))
        .stdout(predicate::str::contains("page_size = 25"))
        .stdout(predicate::str::contains(format!("endpoint = {DEAD_ENDPOINT}")));

    lazydynamo_cmd(&home)
        .args(["config", "show", "--region", "ap-south-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("region = ap-south-1"));
}

#[test]
fn config_parse_error() {
    let home = TempDir::new().unwrap();
    std::fs::create_dir_all(home.path().join(".lazydynamo")).unwrap();
    std::fs::write(home.path().join(".lazydynamo/config.toml"), "segments = \"lots\"\n").unwrap();

    lazydynamo_cmd(&home)
        .args(["config", "show"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("segments"));
}
