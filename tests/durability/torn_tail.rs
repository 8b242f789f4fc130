//! A record cut short by a crash is dropped; earlier records survive

use crate::common::*;

fn two_groups(test: &TestRegistry) -> u64 {
    let groups = test.registry().service_groups();
    groups.create("owner-1", &participant("9915:a"), None).unwrap();
    let after_first = file_size(&test.wal_path(EntityKind::ServiceGroup));
    groups.create("owner-1", &participant("9915:b"), None).unwrap();
    after_first
}

#[test]
fn partial_trailing_bytes_are_discarded() {
    let mut test = TestRegistry::wal();
    two_groups(&test);
    let before = state_of(test.registry());

    let wal = test.wal_path(EntityKind::ServiceGroup);
    test.crash_and_reopen(|_| append_bytes(&wal, &[0x2a, 0x00, 0x00]));

    assert_eq!(state_of(test.registry()), before);
    assert_eq!(file_size(&wal), 0);
}

#[test]
fn truncated_last_record_is_lost_alone() {
    let mut test = TestRegistry::wal();
    two_groups(&test);

    let wal = test.wal_path(EntityKind::ServiceGroup);
    let size = file_size(&wal);
    test.crash_and_reopen(|_| truncate_file(&wal, size - 3));

    let groups = test.registry().service_groups();
    assert!(groups.contains(&participant("9915:a")));
    assert!(!groups.contains(&participant("9915:b")));

    // The store keeps working after recovery
    groups.create("owner-1", &participant("9915:b"), None).unwrap();
    assert_eq!(groups.count(), 2);
}

#[test]
fn cut_at_record_boundary_loses_nothing_before_it() {
    let mut test = TestRegistry::wal();
    let after_first = two_groups(&test);

    let wal = test.wal_path(EntityKind::ServiceGroup);
    test.crash_and_reopen(|_| truncate_file(&wal, after_first));

    assert_eq!(test.registry().service_groups().all_ids(), vec![participant("9915:a").uri()]);
}

#[test]
fn damage_before_the_tail_refuses_to_open() {
    let mut test = TestRegistry::wal();
    let first_len = two_groups(&test);
    assert!(first_len > 0);

    // Flip bytes inside the first record's payload
    let wal = test.wal_path(EntityKind::ServiceGroup);
    let err = test
        .try_crash_and_reopen(|_| {
            corrupt_file_at_offset(&wal, first_len / 2, &[0xde, 0xad, 0xbe, 0xef])
        })
        .unwrap_err();
    assert!(matches!(err, Error::Corruption { .. }), "got {:?}", err);
}

#[test]
fn other_collections_are_unaffected_by_a_torn_log() {
    let mut test = TestRegistry::wal();
    let p = participant("9915:a");
    test.registry().service_groups().create("owner-1", &p, None).unwrap();
    test.registry()
        .merge_service_information(service_info(&p, &doc_type("invoice"), &[("A", &[AS4])]))
        .unwrap();
    test.registry()
        .merge_service_information(service_info(&p, &doc_type("order"), &[("A", &[AS4])]))
        .unwrap();

    let wal = test.wal_path(EntityKind::ServiceInformation);
    let size = file_size(&wal);
    test.crash_and_reopen(|_| truncate_file(&wal, size - 1));

    let registry = test.registry();
    assert!(registry.service_groups().contains(&p));
    assert!(registry
        .service_information()
        .get_of_group_and_doc_type(&p, &doc_type("invoice"))
        .is_some());
    assert!(registry
        .service_information()
        .get_of_group_and_doc_type(&p, &doc_type("order"))
        .is_none());
}
