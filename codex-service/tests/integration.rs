use std::path::Path;
use std::process::{Child, Command};
use std::time::Duration;
use tempfile::TempDir;

/// Kills the service when the test ends, pass or fail
struct ServiceGuard(Child);

impl Drop for ServiceGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// Source tree with two projects, one binary file and a .git directory
fn create_test_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "robot/servo_motor.ino", "void setup() {}\nvoid loop() {}\n");
    write(root, "robot/readme.md", "# robot\n");
    write(root, "web/api.js", "export const api = 1;\n");
    write(root, ".git/config", "[core]\n");
    std::fs::write(root.join("web/logo.bin"), [0u8, 159, 146, 150]).unwrap();
    dir
}

/// Helper to find a free port
fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Helper to wait for the service to be ready
fn wait_for_service(base_url: &str, timeout: Duration) -> bool {
    let client = reqwest::blocking::Client::new();
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if client.get(format!("{}/status", base_url)).send().is_ok() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    false
}

fn start_service(workdir: &Path) -> (ServiceGuard, String) {
    let port = free_port();
    let base_url = format!("http://127.0.0.1:{}", port);

    let child = Command::new(env!("CARGO_BIN_EXE_codex-service"))
        .args(["--port", &port.to_string()])
        .arg("--db")
        .arg(workdir.join("catalog.db"))
        .current_dir(workdir)
        .env_remove("CODEX_CONFIG")
        .env_remove("CODEX_AUTO_FIX")
        .env_remove("ALLOWED_EXTENSIONS")
        .env_remove("MAX_FILE_SIZE")
        .env_remove("CODEX_PRUNE_DIRS")
        .spawn()
        .expect("Failed to start codex-service");
    let guard = ServiceGuard(child);

    assert!(
        wait_for_service(&base_url, Duration::from_secs(10)),
        "Service failed to start"
    );
    (guard, base_url)
}

#[test]
fn test_index_reconcile_lifecycle() {
    let tree = create_test_tree();
    let workdir = TempDir::new().unwrap();
    let (_service, base_url) = start_service(workdir.path());
    let client = reqwest::blocking::Client::new();
    let directory = tree.path().to_string_lossy().to_string();

    // 1. First index run
    let resp: serde_json::Value = client
        .post(format!("{}/index", base_url))
        .json(&serde_json::json!({ "directory": &directory }))
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(resp["files_indexed"].as_u64(), Some(3), "{}", resp);
    assert!(resp["files_skipped"].as_u64().unwrap() >= 1);
    assert_eq!(resp["errors"].as_array().map(|e| e.len()), Some(0));

    // 2. Second run is idempotent
    let resp: serde_json::Value = client
        .post(format!("{}/index", base_url))
        .json(&serde_json::json!({ "directory": &directory }))
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(resp["files_indexed"].as_u64(), Some(0));
    assert_eq!(resp["files_updated"].as_u64(), Some(0));
    assert_eq!(resp["files_unchanged"].as_u64(), Some(3));

    // 3. Search by inferred tag
    let resp: serde_json::Value = client
        .get(format!("{}/search", base_url))
        .query(&[("q", "hardware")])
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(resp["total"].as_u64(), Some(1), "{}", resp);
    assert_eq!(resp["results"][0]["project"].as_str(), Some("robot"));

    // 4. Delete a file and analyze
    std::fs::remove_file(tree.path().join("web/api.js")).unwrap();
    let resp: serde_json::Value = client
        .post(format!("{}/reconcile/analyze", base_url))
        .json(&serde_json::json!({ "directory": &directory }))
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(resp["orphaned_db_records"].as_u64(), Some(1), "{}", resp);
    assert_eq!(resp["issues"][0]["kind"].as_str(), Some("orphaned_db_record"));

    // 5. Fix without confirmation is refused
    let resp = client
        .post(format!("{}/reconcile/fix", base_url))
        .json(&serde_json::json!({ "directory": &directory }))
        .send()
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["code"].as_str(), Some("confirmation_required"));

    // 6. Confirmed fix removes the orphan
    let resp: serde_json::Value = client
        .post(format!("{}/reconcile/fix", base_url))
        .json(&serde_json::json!({ "directory": &directory, "confirm": true }))
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(resp["orphans_removed"].as_u64(), Some(1), "{}", resp);

    let resp: serde_json::Value = client
        .post(format!("{}/reconcile/analyze", base_url))
        .json(&serde_json::json!({ "directory": &directory }))
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(resp["issues"].as_array().map(|i| i.len()), Some(0), "{}", resp);

    // 7. Stats reflect the repaired catalog
    let resp: serde_json::Value = client
        .get(format!("{}/stats", base_url))
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(resp["files_active"].as_u64(), Some(2));
    assert_eq!(resp["projects"].as_u64(), Some(2));
}

#[test]
fn test_error_envelopes() {
    let workdir = TempDir::new().unwrap();
    let (_service, base_url) = start_service(workdir.path());
    let client = reqwest::blocking::Client::new();

    let resp = client
        .post(format!("{}/index", base_url))
        .json(&serde_json::json!({ "directory": "/no/such/codex/dir" }))
        .send()
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["code"].as_str(), Some("directory_not_found"));
    assert!(body["hint"].as_str().is_some());

    let tree = create_test_tree();
    let resp = client
        .post(format!("{}/index", base_url))
        .json(&serde_json::json!({
            "directory": tree.path().to_string_lossy(),
            "project_id": 999
        }))
        .send()
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["code"].as_str(), Some("project_not_found"));

    let resp = client
        .get(format!("{}/search", base_url))
        .send()
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}
