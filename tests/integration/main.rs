//! Integration tests for the shellcache binary

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    fn shellcache() -> Command {
        let mut cmd = cargo_bin_cmd!("shellcache");
        cmd.env("SHELLCACHE_PLAIN", "1")
            .env_remove("SHELLCACHE_CONFIG")
            .env_remove("SHELLCACHE_MANIFEST");
        cmd
    }

    #[test]
    fn help_displays() {
        shellcache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("resource cache manager"));
    }

    #[test]
    fn version_displays() {
        shellcache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("shellcache"));
    }

    #[test]
    fn config_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        shellcache()
            .args(["config", "path", "-c"])
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let dir = TempDir::new().unwrap();
        shellcache()
            .args(["config", "show", "-c"])
            .arg(dir.path().join("config.toml"))
            .assert()
            .success()
            .stdout(predicate::str::contains("[origin]"))
            .stdout(predicate::str::contains("app-temp-cache"));
    }

    #[test]
    fn config_set_unknown_key_fails() {
        let dir = TempDir::new().unwrap();
        shellcache()
            .args(["config", "set", "vm.name", "x", "-c"])
            .arg(dir.path().join("config.toml"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn status_without_manifest_fails() {
        let dir = TempDir::new().unwrap();
        shellcache()
            .args(["status", "-c"])
            .arg(dir.path().join("config.toml"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("No resource manifest configured"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn unknown_message_rejected() {
        shellcache()
            .args(["message", "reboot"])
            .assert()
            .failure();
    }

    #[test]
    fn completions_generate() {
        shellcache()
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("shellcache"));
    }
}

mod upgrade_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::collections::HashMap;
    use std::io::{BufRead, BufReader, Write};
    use std::net::{TcpListener, TcpStream};
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use tempfile::TempDir;

    type Files = Arc<Mutex<HashMap<String, String>>>;

    /// Minimal HTTP/1.1 origin serving a mutable set of files
    fn serve(files: Files) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                respond(stream, &files);
            }
        });
        url
    }

    fn respond(mut stream: TcpStream, files: &Files) {
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).is_err() {
            return;
        }
        loop {
            let mut header = String::new();
            match reader.read_line(&mut header) {
                Ok(0) | Err(_) => break,
                Ok(_) if header == "\r\n" => break,
                Ok(_) => {}
            }
        }

        let target = request_line.split_whitespace().nth(1).unwrap_or("/");
        let path = target.split('?').next().unwrap_or("/");
        let (status, body) = match files.lock().unwrap().get(path) {
            Some(body) => ("200 OK", body.clone()),
            None => ("404 Not Found", "not found".to_string()),
        };
        let _ = write!(
            stream,
            "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
    }

    struct Site {
        _dir: TempDir,
        config: PathBuf,
        manifest: PathBuf,
        files: Files,
        origin: String,
    }

    impl Site {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let files: Files = Arc::default();
            let origin = serve(files.clone());

            let config = dir.path().join("config.toml");
            let manifest = dir.path().join("manifest.json");
            let store = dir.path().join("store");
            std::fs::write(
                &config,
                format!(
                    "[general]\njournal = false\n\n[origin]\nurl = \"{}\"\n\n[manifest]\npath = {:?}\n\n[store]\nroot = {:?}\n",
                    origin,
                    manifest.display().to_string(),
                    store.display().to_string()
                ),
            )
            .unwrap();

            Self {
                _dir: dir,
                config,
                manifest,
                files,
                origin,
            }
        }

        /// Publish a version: files on the origin plus the matching manifest
        fn publish(&self, version: &str, main_fingerprint: &str) {
            let mut files = self.files.lock().unwrap();
            files.insert("/".to_string(), format!("root {}", version));
            files.insert("/index.html".to_string(), format!("index {}", version));
            files.insert("/main.js".to_string(), format!("main.js {}", version));
            files.insert("/logo.png".to_string(), format!("logo {}", version));

            let manifest = format!(
                r#"{{
                    "resources": {{"/": "r1", "index.html": "r1", "main.js": "{}", "logo.png": "l1"}},
                    "core": ["/", "index.html", "main.js"]
                }}"#,
                main_fingerprint
            );
            write_file(&self.manifest, &manifest);
        }

        fn cmd(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("shellcache");
            cmd.env("SHELLCACHE_PLAIN", "1")
                .env_remove("SHELLCACHE_MANIFEST")
                .env("SHELLCACHE_CONFIG", &self.config);
            cmd
        }
    }

    fn write_file(path: &Path, content: &str) {
        std::fs::write(path, content).unwrap();
    }

    fn status_json(site: &Site) -> serde_json::Value {
        let output = site
            .cmd()
            .args(["status", "--format", "json"])
            .output()
            .unwrap();
        assert!(output.status.success());
        serde_json::from_slice(&output.stdout).unwrap()
    }

    #[test]
    fn upgrade_then_serve_offline() {
        let site = Site::new();
        site.publish("v1", "m1");

        let status = status_json(&site);
        assert_eq!(status["state"], "idle");

        site.cmd()
            .arg("upgrade")
            .assert()
            .success()
            .stdout(predicate::str::contains("Promoted: 3"));

        let status = status_json(&site);
        assert_eq!(status["state"], "live");
        assert_eq!(status["manifest_current"], true);
        assert_eq!(status["cached"], 3);
        assert_eq!(status["resources"], 4);

        // Core shell comes from the live cache
        site.cmd()
            .args(["fetch", "/main.js?v=123"])
            .assert()
            .success()
            .stdout("main.js v1")
            .stderr(predicate::str::contains("cache"));

        // Lazy fill on first request, served from cache afterwards
        site.cmd()
            .args(["fetch", "/logo.png"])
            .assert()
            .success()
            .stderr(predicate::str::contains("network"));
        site.cmd()
            .args(["fetch", "/logo.png"])
            .assert()
            .success()
            .stdout("logo v1")
            .stderr(predicate::str::contains("cache"));

        // Unreachable origin: root falls back to the cached copy
        site.cmd()
            .args(["--origin", "http://127.0.0.1:9", "fetch", "/"])
            .assert()
            .success()
            .stdout("root v1")
            .stderr(predicate::str::contains("cache"));

        // Not in the manifest
        site.cmd()
            .args(["fetch", "/api/data"])
            .assert()
            .success()
            .stdout("")
            .stderr(predicate::str::contains("bypass"));
    }

    #[test]
    fn incremental_upgrade_replaces_changed_resources() {
        let site = Site::new();
        site.publish("v1", "m1");
        site.cmd().arg("upgrade").assert().success();

        site.publish("v2", "m2");
        let status = status_json(&site);
        assert_eq!(status["manifest_current"], false);

        site.cmd()
            .arg("upgrade")
            .assert()
            .success()
            .stdout(predicate::str::contains("main.js"));

        site.cmd()
            .args(["fetch", &format!("{}/main.js", site.origin)])
            .assert()
            .success()
            .stdout("main.js v2");
    }

    #[test]
    fn separate_install_and_activate() {
        let site = Site::new();
        site.publish("v1", "m1");

        site.cmd().arg("install").assert().success();
        assert_eq!(status_json(&site)["state"], "installed");

        site.cmd().arg("activate").assert().success();
        assert_eq!(status_json(&site)["state"], "live");
    }

    #[test]
    fn activate_without_install_fails() {
        let site = Site::new();
        site.publish("v1", "m1");

        site.cmd()
            .arg("activate")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Cannot handle"));
    }

    #[test]
    fn download_offline_fills_live() {
        let site = Site::new();
        site.publish("v1", "m1");

        site.cmd()
            .args(["message", "download-offline"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not active"));

        site.cmd().arg("upgrade").assert().success();
        site.cmd()
            .args(["message", "download-offline"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Downloaded 1 resources"));

        assert_eq!(status_json(&site)["cached"], 4);
    }

    #[test]
    fn clear_returns_to_idle() {
        let site = Site::new();
        site.publish("v1", "m1");
        site.cmd().arg("upgrade").assert().success();

        site.cmd()
            .args(["clear", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Cache cleared"));

        let status = status_json(&site);
        assert_eq!(status["state"], "idle");
        assert!(status["live"]["entries"].is_null());
    }
}
