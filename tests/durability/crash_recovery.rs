//! Reopening after a crash yields the state of an uninterrupted run

use crate::common::*;

/// One step of a registry workload
type Step = fn(&SmpRegistry);

fn workload() -> Vec<Step> {
    vec![
        |r| {
            r.service_groups()
                .create("owner-1", &participant("9915:a"), None)
                .unwrap();
        },
        |r| {
            r.service_groups()
                .create("owner-2", &participant("9915:B"), Some("<Ext/>".into()))
                .unwrap();
        },
        |r| {
            let p = participant("9915:a");
            r.merge_service_information(service_info(&p, &doc_type("invoice"), &[("A", &[AS4]), ("B", &[AS2])]))
                .unwrap();
        },
        |r| {
            let p = participant("9915:a");
            r.upsert_endpoint(&p, &doc_type("invoice"), &process_id("A"), endpoint(START, "https://a.example.org"))
                .unwrap();
        },
        |r| {
            let p = participant("9915:b");
            r.create_or_update_redirect(&p, &doc_type("order"), "https://smp2.example.org", "CN=SMP2", None, None)
                .unwrap();
        },
        |r| {
            let p = participant("9915:b");
            r.merge_service_information(service_info(&p, &doc_type("order"), &[("A", &[AS4])]))
                .unwrap();
        },
        |r| {
            r.service_groups()
                .update(&participant("9915:a"), "owner-3", None)
                .unwrap();
        },
        |r| {
            let p = participant("9915:a");
            r.merge_service_information(service_info(&p, &doc_type("invoice"), &[("A", &[AS4])]))
                .unwrap();
        },
        |r| {
            r.service_groups()
                .create("owner-1", &participant("9915:c"), None)
                .unwrap();
        },
        |r| {
            r.transport_profiles()
                .create("acme-transport-x", "ACME X", false)
                .unwrap();
        },
        |r| {
            r.transport_profiles()
                .update("busdox-transport-as2-ver2p0", "AS2 v2", true)
                .unwrap();
        },
        |r| {
            r.service_groups().delete(&participant("9915:b")).unwrap();
        },
    ]
}

fn uninterrupted() -> RegistryState {
    let registry = SmpRegistry::ephemeral().unwrap();
    for step in workload() {
        step(&registry);
    }
    state_of(&registry)
}

#[test]
fn reopen_after_every_step_matches_uninterrupted_run() {
    let expected = uninterrupted();
    let mut test = TestRegistry::wal();
    for step in workload() {
        step(test.registry());
        let before = state_of(test.registry());
        test.reopen();
        assert_eq!(state_of(test.registry()), before);
    }
    assert_eq!(state_of(test.registry()), expected);
}

#[test]
fn single_crash_at_each_point_matches_uninterrupted_run() {
    let expected = uninterrupted();
    for crash_after in 0..workload().len() {
        let mut test = TestRegistry::wal();
        for (i, step) in workload().into_iter().enumerate() {
            step(test.registry());
            if i == crash_after {
                test.reopen();
            }
        }
        assert_eq!(state_of(test.registry()), expected, "crash after step {}", crash_after);
    }
}

#[test]
fn unflushed_writes_replay_from_log() {
    let mut test = TestRegistry::wal();
    for step in workload() {
        step(test.registry());
    }
    assert!(file_size(&test.wal_path(EntityKind::ServiceGroup)) > 0);

    test.reopen();
    assert_eq!(state_of(test.registry()), uninterrupted());
    // Recovery checkpoints, so the logs start empty again
    for kind in EntityKind::all() {
        assert_eq!(file_size(&test.wal_path(kind)), 0, "{} log", kind);
        assert!(test.snapshot_path(kind).exists(), "{} snapshot", kind);
    }
}

#[test]
fn flush_then_reopen_reads_snapshots_only() {
    let mut test = TestRegistry::wal();
    for step in workload() {
        step(test.registry());
    }
    test.registry().flush().unwrap();
    for kind in EntityKind::all() {
        assert_eq!(file_size(&test.wal_path(kind)), 0);
    }
    test.reopen();
    assert_eq!(state_of(test.registry()), uninterrupted());
}

#[test]
fn standard_durability_survives_clean_drop() {
    let mut test = TestRegistry::with_config(
        RegistryConfig::default()
            .with_backend(BackendKind::Wal)
            .with_durability("standard"),
    );
    for step in workload() {
        step(test.registry());
    }
    test.reopen();
    assert_eq!(state_of(test.registry()), uninterrupted());
}
