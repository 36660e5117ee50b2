//! Tests for configuration loading and root folder resolution
//!
//! Tests that touch TEACHTUNE_ROOT_FOLDER or TEACHTUNE_ROOT are marked
//! #[serial] so they never race on the process environment.

use chrono::FixedOffset;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use teachtune_common::config::{
    CompiledDefaults, LoggingConfig, RootFolderInitializer, RootFolderResolver, TomlConfig,
    DATABASE_FILE, ROOT_ENV, ROOT_FOLDER_ENV,
};
use teachtune_common::SchedulingZone;

fn clear_env() {
    env::remove_var(ROOT_FOLDER_ENV);
    env::remove_var(ROOT_ENV);
}

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert_eq!(defaults.log_level, "info");
    assert!(defaults.root_folder.to_string_lossy().contains("teachtune"));
}

#[test]
#[serial]
fn test_cli_arg_wins_over_env() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/teachtune-from-env");

    let resolver = RootFolderResolver::new("test-module")
        .with_cli_arg(Some(PathBuf::from("/tmp/teachtune-from-cli")));
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/teachtune-from-cli"));

    clear_env();
}

#[test]
#[serial]
fn test_env_root_folder_preferred_over_short_alias() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/teachtune-long");
    env::set_var(ROOT_ENV, "/tmp/teachtune-short");

    let resolver = RootFolderResolver::new("test-module");
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/teachtune-long"));

    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/teachtune-short"));

    clear_env();
}

#[test]
#[serial]
fn test_blank_env_var_is_ignored() {
    clear_env();
    env::set_var(ROOT_FOLDER_ENV, "   ");

    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/teachtune-from-toml")),
        ..TomlConfig::default()
    };
    let resolver = RootFolderResolver::new("test-module").with_toml(&toml);
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/teachtune-from-toml"));

    clear_env();
}

#[test]
#[serial]
fn test_env_wins_over_toml() {
    clear_env();
    env::set_var(ROOT_ENV, "/tmp/teachtune-env");

    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/teachtune-toml")),
        ..TomlConfig::default()
    };
    let resolver = RootFolderResolver::new("test-module").with_toml(&toml);
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/teachtune-env"));

    clear_env();
}

#[test]
fn test_toml_parsing_full() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agenda.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/srv/teachtune"
timezone = "-03:00"

[logging]
level = "debug"
file = "/var/log/teachtune.log"
"#,
    )
    .unwrap();

    let config = TomlConfig::load(&path).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/teachtune")));
    assert_eq!(
        config.timezone,
        SchedulingZone::Fixed(FixedOffset::west_opt(3 * 3600).unwrap())
    );
    assert_eq!(
        config.logging,
        LoggingConfig {
            level: "debug".into(),
            file: Some(PathBuf::from("/var/log/teachtune.log")),
        }
    );
}

#[test]
fn test_toml_parsing_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.toml");
    std::fs::write(&path, "").unwrap();

    let config = TomlConfig::load(&path).unwrap();
    assert_eq!(config, TomlConfig::default());
    assert_eq!(config.timezone, SchedulingZone::Local);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_toml_rejects_unknown_zone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "timezone = \"Mars/Olympus\"\n").unwrap();

    let err = TomlConfig::load(&path).unwrap_err();
    assert!(matches!(err, teachtune_common::Error::Config(_)), "{:?}", err);
}

#[test]
fn test_missing_toml_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = TomlConfig::load(&dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, teachtune_common::Error::Io(_)));
}

#[test]
fn test_initializer_creates_nested_directory() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("a").join("b");

    let initializer = RootFolderInitializer::new(root.clone());
    assert!(!initializer.database_exists());

    initializer.ensure_directory_exists().unwrap();
    assert!(root.is_dir());
    assert_eq!(initializer.database_path(), root.join(DATABASE_FILE));

    // Second call is a no-op
    initializer.ensure_directory_exists().unwrap();
}

/// Point `dirs::config_dir()` at `dir` for the duration of `f`
#[cfg(target_os = "linux")]
fn with_config_home<F: FnOnce()>(dir: &std::path::Path, f: F) {
    let previous = env::var_os("XDG_CONFIG_HOME");
    env::set_var("XDG_CONFIG_HOME", dir);
    f();
    match previous {
        Some(value) => env::set_var("XDG_CONFIG_HOME", value),
        None => env::remove_var("XDG_CONFIG_HOME"),
    }
}

#[test]
#[serial]
#[cfg(target_os = "linux")]
fn test_load_module_reports_bad_zone() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("teachtune")).unwrap();
    std::fs::write(
        dir.path().join("teachtune").join("zone-module.toml"),
        "timezone = \"America/Sao_Paulo\"\n",
    )
    .unwrap();

    with_config_home(dir.path(), || {
        let err = TomlConfig::load_module("zone-module").unwrap_err();
        assert!(matches!(err, teachtune_common::Error::Config(_)), "{:?}", err);
        assert_eq!(TomlConfig::load_or_default("zone-module"), TomlConfig::default());
    });
}

#[test]
#[serial]
#[cfg(target_os = "linux")]
fn test_load_module_without_file_is_none() {
    let dir = tempfile::tempdir().unwrap();

    with_config_home(dir.path(), || {
        assert_eq!(TomlConfig::load_module("absent-module").unwrap(), None);
    });
}

#[test]
fn test_log_file_not_configured() {
    assert!(LoggingConfig::default().open_file().unwrap().is_none());
}

#[test]
fn test_log_file_created_and_appended() {
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("agenda.log");
    let logging = LoggingConfig {
        level: "info".into(),
        file: Some(path.clone()),
    };

    logging.open_file().unwrap().unwrap().write_all(b"first\n").unwrap();
    logging.open_file().unwrap().unwrap().write_all(b"second\n").unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
}
