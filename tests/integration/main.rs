//! Integration tests for rootcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn rootcache() -> Command {
        let mut cmd = cargo_bin_cmd!("rootcache");
        cmd.env_remove("ROOTCACHE_CONFIG");
        cmd
    }

    /// Write a config that caches into `cache_dir` without compression
    fn write_config(dir: &Path, cache_dir: &Path) -> PathBuf {
        let path = dir.join("config.toml");
        fs::write(
            &path,
            format!(
                "[root_cache]\n\
                 dir = \"{}\"\n\
                 compress_program = \"none\"\n",
                cache_dir.display()
            ),
        )
        .unwrap();
        path
    }

    #[test]
    fn help_displays() {
        rootcache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Shared archive cache"));
    }

    #[test]
    fn version_displays() {
        rootcache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("rootcache"));
    }

    #[test]
    fn hook_help_lists_events() {
        rootcache()
            .args(["hook", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("post-package-manager"));
    }

    #[test]
    fn missing_explicit_config_fails() {
        rootcache()
            .args(["--config", "/nonexistent/rootcache.toml", "status"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Configuration file not found"));
    }

    #[test]
    fn config_show_uses_file() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), &temp.path().join("cache"));

        rootcache()
            .arg("--config")
            .arg(&config)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[root_cache]"))
            .stdout(predicate::str::contains("compress_program = \"none\""));
    }

    #[test]
    fn status_reports_missing_archive() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), &temp.path().join("cache"));

        rootcache()
            .arg("--config")
            .arg(&config)
            .args(["status", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"verdict\": \"missing\""))
            .stdout(predicate::str::contains("cache.tar"));
    }

    #[test]
    fn post_init_packs_and_pre_init_unpacks() {
        let temp = TempDir::new().unwrap();
        let cache_dir = temp.path().join("cache");
        let config = write_config(temp.path(), &cache_dir);

        let first = temp.path().join("first");
        fs::create_dir_all(first.join("etc")).unwrap();
        fs::create_dir_all(first.join("proc")).unwrap();
        fs::write(first.join("etc/os-release"), "NAME=Test\n").unwrap();
        fs::write(first.join("proc/cpuinfo"), "volatile").unwrap();

        let install_log = temp.path().join("install.log");
        fs::write(&install_log, "Installed: bash coreutils\n").unwrap();

        rootcache()
            .arg("--config")
            .arg(&config)
            .args(["hook", "post-init", "--root"])
            .arg(&first)
            .arg("--install-log")
            .arg(&install_log)
            .assert()
            .success();

        assert!(cache_dir.join("cache.tar").is_file());
        assert_eq!(
            fs::read_to_string(cache_dir.join("cache.log")).unwrap(),
            "Installed: bash coreutils\n"
        );

        let second = temp.path().join("second");
        fs::create_dir_all(&second).unwrap();

        rootcache()
            .arg("--config")
            .arg(&config)
            .args(["hook", "pre-init", "--root"])
            .arg(&second)
            .assert()
            .success()
            .stdout(predicate::str::contains("served from cache"));

        assert_eq!(
            fs::read_to_string(second.join("etc/os-release")).unwrap(),
            "NAME=Test\n"
        );
        assert!(second.join("proc").is_dir());
        assert!(!second.join("proc/cpuinfo").exists());

        rootcache()
            .arg("--config")
            .arg(&config)
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Archive is fresh"));
    }

    #[test]
    fn initialized_root_is_left_alone() {
        let temp = TempDir::new().unwrap();
        let cache_dir = temp.path().join("cache");
        let config = write_config(temp.path(), &cache_dir);

        let root = temp.path().join("root");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("marker"), "x").unwrap();

        rootcache()
            .arg("--config")
            .arg(&config)
            .args(["hook", "post-init", "--initialized", "--root"])
            .arg(&root)
            .assert()
            .success()
            .stdout(predicate::str::contains("served from cache").not());

        assert!(!cache_dir.join("cache.tar").exists());
    }
}
