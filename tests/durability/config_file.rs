//! `smp.toml` in the data directory selects and tunes the backend

use crate::common::*;
use smp_registry::CONFIG_FILE_NAME;
use std::fs;

#[test]
fn first_open_writes_default_config() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let registry = SmpRegistry::open(dir.path()).unwrap();

    assert!(dir.path().join(CONFIG_FILE_NAME).exists());
    assert_eq!(registry.config(), &RegistryConfig::default());
    assert_eq!(registry.service_groups().backend_name(), "wal");
    assert_eq!(registry.path(), Some(dir.path()));
}

#[test]
fn existing_config_is_respected() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        "backend = \"memory\"\n",
    )
    .unwrap();

    let registry = SmpRegistry::open(dir.path()).unwrap();
    registry
        .service_groups()
        .create("owner-1", &participant("9915:xxx"), None)
        .unwrap();
    assert_eq!(registry.service_groups().backend_name(), "memory");
    assert!(!dir.path().join("service_group.wal").exists());

    // Missing keys fall back to defaults
    assert_eq!(registry.config().durability, "always");
    assert_eq!(registry.config().snapshot_threshold, 1000);
}

#[test]
fn threshold_from_config_file_applies() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        "backend = \"wal\"\nsnapshot_threshold = 2\n",
    )
    .unwrap();

    let registry = SmpRegistry::open(dir.path()).unwrap();
    for v in ["9915:a", "9915:b"] {
        registry
            .service_groups()
            .create("owner-1", &participant(v), None)
            .unwrap();
    }
    assert_eq!(file_size(&dir.path().join("service_group.wal")), 0);
    assert!(dir.path().join("service_group.json").exists());
}

#[test]
fn invalid_config_is_a_validation_error() {
    init_tracing();
    for content in [
        "durability = \"sometimes\"\n",
        "snapshot_threshold = 0\n",
        "backend = \"postgres\"\n",
        "this is not toml",
    ] {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), content).unwrap();
        let err = SmpRegistry::open(dir.path()).err().expect("open must fail");
        assert!(err.is_validation(), "{:?} for {:?}", err, content);
    }
}

#[test]
fn explicit_config_does_not_touch_config_file() {
    let test = TestRegistry::wal();
    assert!(!test.path().join(CONFIG_FILE_NAME).exists());
}
