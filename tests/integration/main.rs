//! Integration tests for Quarry

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn quarry() -> Command {
        cargo_bin_cmd!("quarry")
    }

    /// Write a config file pointing the cache root into `dir`.
    fn config_with_root(dir: &Path) -> PathBuf {
        let config_path = dir.join("config.toml");
        let root = dir.join("cache");
        std::fs::write(
            &config_path,
            format!("[cache]\nroot = \"{}\"\n", root.display()),
        )
        .unwrap();
        config_path
    }

    #[test]
    fn help_displays() {
        quarry()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("mirror cache"));
    }

    #[test]
    fn version_displays() {
        quarry()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("quarry"));
    }

    #[test]
    fn list_empty_cache() {
        let temp = TempDir::new().unwrap();
        let config = config_with_root(temp.path());

        quarry()
            .env("QUARRY_CONFIG", &config)
            .args(["list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache entries found"));
    }

    #[test]
    fn delete_rejects_escaping_path() {
        let temp = TempDir::new().unwrap();
        let config = config_with_root(temp.path());

        quarry()
            .env("QUARRY_CONFIG", &config)
            .args(["delete", "../../etc"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid path"));
    }

    #[test]
    fn clean_reports_evictions() {
        let temp = TempDir::new().unwrap();
        let config = config_with_root(temp.path());

        quarry()
            .env("QUARRY_CONFIG", &config)
            .args(["clean"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Evicted 0 expired entries"));
    }

    #[test]
    fn malformed_config_fails_cleanly() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config.toml");
        std::fs::write(&config, "not toml [").unwrap();

        quarry()
            .env("QUARRY_CONFIG", &config)
            .args(["list"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }
}

mod end_to_end {
    use assert_cmd::cargo::cargo_bin_cmd;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const REVISION: &str = "0123456789abcdef0123456789abcdef01234567";

    /// Config pointing both the API and archive hosts at the mock server.
    fn config_for(dir: &Path, upstream: &str) -> PathBuf {
        let config_path = dir.join("config.toml");
        let root = dir.join("cache");
        std::fs::write(
            &config_path,
            format!(
                "[cache]\nroot = \"{}\"\n\n[github]\napi_base = \"{upstream}\"\narchive_base = \"{upstream}\"\n",
                root.display()
            ),
        )
        .unwrap();
        config_path
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn fetch_caches_archive_with_sidecars() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/tool/branches/main"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"commit": {"sha": REVISION}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/octo/tool/zip/main"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK\x03\x04zip".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let config = config_for(temp.path(), &server.uri());

        let config_for_cmd = config.clone();
        tokio::task::spawn_blocking(move || {
            cargo_bin_cmd!("quarry")
                .env("QUARRY_CONFIG", &config_for_cmd)
                .args(["fetch", "octo/tool", "--branch", "main", "--user", "alice"])
                .assert()
                .success();
        })
        .await
        .unwrap();

        let zip = temp
            .path()
            .join("cache/users/alice/repos/octo/tool/main.zip");
        assert!(zip.is_file());
        assert_eq!(
            std::fs::read_to_string(zip.with_extension("zip.meta")).unwrap(),
            REVISION
        );
        assert_eq!(
            std::fs::read_to_string(zip.with_extension("commit.txt")).unwrap(),
            &REVISION[..7]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn get_caches_package_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dl/tool-1.2.3.tar.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"tarball".to_vec()))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let config = config_for(temp.path(), &server.uri());
        let url = format!("{}/dl/tool-1.2.3.tar.gz", server.uri());

        let config_for_cmd = config.clone();
        tokio::task::spawn_blocking(move || {
            cargo_bin_cmd!("quarry")
                .env("QUARRY_CONFIG", &config_for_cmd)
                .args(["get", &url])
                .assert()
                .success();
        })
        .await
        .unwrap();

        let packages = temp.path().join("cache/users/default/packages");
        let hash_dir = std::fs::read_dir(&packages).unwrap().next().unwrap().unwrap();
        let package = hash_dir.path().join("tool-1.2.3.tar.gz");
        assert_eq!(std::fs::read(package).unwrap(), b"tarball");
    }
}
