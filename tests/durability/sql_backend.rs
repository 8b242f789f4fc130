//! SQLite backend: persistence across reopen and row-level merge

use crate::common::*;
use smp_registry::SqlBackend;

const HTTP: &str = "peppol-transport-http";

fn row_counts(dir: &std::path::Path) -> [usize; 5] {
    let backend = SqlBackend::open(&dir.join(smp_registry::DEFAULT_SQL_FILE)).unwrap();
    [
        "smp_service_group",
        "smp_service_metadata",
        "smp_process",
        "smp_endpoint",
        "smp_service_metadata_redirection",
    ]
    .map(|table| backend.table_row_count(table).unwrap())
}

#[test]
fn everything_survives_reopen() {
    let mut test = TestRegistry::sql();
    let p = participant("9915:XXX");
    let registry = test.registry();
    registry
        .service_groups()
        .create("owner-1", &p, Some("<Ext/>".into()))
        .unwrap();
    registry
        .merge_service_information(
            service_info(&p, &doc_type("invoice"), &[("A", &[AS4, AS2])]).with_extension("<SI/>"),
        )
        .unwrap();
    registry
        .create_or_update_redirect(&p, &doc_type("order"), "https://smp2.example.org", "CN=SMP2", Some("MIIC".into()), None)
        .unwrap();
    let before = state_of(registry);

    test.reopen();
    assert_eq!(state_of(test.registry()), before);
    assert!(test.registry().service_groups().contains(&participant("9915:xxx")));
    assert!(test.path().join("smp.db").exists());
}

#[test]
fn merge_writes_only_the_difference() {
    let mut test = TestRegistry::sql();
    let p = participant("9915:xxx");
    let d = doc_type("invoice");
    let registry = test.registry();
    registry.service_groups().create("owner-1", &p, None).unwrap();
    registry
        .merge_service_information(service_info(&p, &d, &[("A", &[HTTP]), ("B", &[AS2])]))
        .unwrap();
    registry
        .merge_service_information(service_info(&p, &d, &[("A", &[HTTP, AS4])]))
        .unwrap();
    let before = state_of(registry);

    test.crash_and_reopen(|dir| {
        assert_eq!(row_counts(dir), [1, 1, 1, 2, 0]);
    });
    assert_eq!(state_of(test.registry()), before);
}

#[test]
fn group_delete_cascades_in_the_database() {
    let mut test = TestRegistry::sql();
    let p = participant("9915:xxx");
    let registry = test.registry();
    registry.service_groups().create("owner-1", &p, None).unwrap();
    registry
        .merge_service_information(service_info(&p, &doc_type("invoice"), &[("A", &[AS4])]))
        .unwrap();
    registry
        .create_or_update_redirect(&p, &doc_type("order"), "https://smp2.example.org", "CN=SMP2", None, None)
        .unwrap();
    registry.service_groups().delete(&p).unwrap();

    test.crash_and_reopen(|dir| {
        assert_eq!(row_counts(dir), [0, 0, 0, 0, 0]);
    });
    assert_eq!(test.registry().service_groups().count(), 0);
}

#[test]
fn exchange_between_redirect_and_service_information_persists() {
    let mut test = TestRegistry::sql();
    let p = participant("9915:xxx");
    let d = doc_type("invoice");
    let registry = test.registry();
    registry.service_groups().create("owner-1", &p, None).unwrap();
    registry
        .merge_service_information(service_info(&p, &d, &[("A", &[AS4])]))
        .unwrap();
    registry
        .create_or_update_redirect(&p, &d, "https://smp2.example.org", "CN=SMP2", None, None)
        .unwrap();

    test.crash_and_reopen(|dir| {
        assert_eq!(row_counts(dir), [1, 0, 0, 0, 1]);
    });
    assert!(test
        .registry()
        .service_information()
        .get_of_group_and_doc_type(&p, &d)
        .is_none());
}

#[test]
fn custom_database_file_name() {
    let test = TestRegistry::with_config(
        RegistryConfig::default()
            .with_backend(BackendKind::Sql)
            .with_sql_file("registry.sqlite"),
    );
    test.registry()
        .service_groups()
        .create("owner-1", &participant("9915:xxx"), None)
        .unwrap();
    assert!(test.path().join("registry.sqlite").exists());
    assert!(!test.path().join("smp.db").exists());
}

#[test]
fn endpoint_validity_window_survives_reopen() {
    use chrono::{TimeZone, Utc};

    let mut test = TestRegistry::sql();
    let p = participant("9915:xxx");
    let d = doc_type("invoice");
    let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let until = Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap();

    let registry = test.registry();
    registry.service_groups().create("owner-1", &p, None).unwrap();
    registry
        .upsert_endpoint(
            &p,
            &d,
            &process_id("A"),
            endpoint(AS4, "https://ap.example.org").with_validity(Some(from), Some(until)),
        )
        .unwrap();

    test.reopen();
    let ep = test
        .registry()
        .service_information()
        .get_of_group_and_doc_type(&p, &d)
        .and_then(|si| si.endpoint(&process_id("A"), AS4).cloned())
        .unwrap();
    assert_eq!(ep.service_activation, Some(from));
    assert_eq!(ep.service_expiration, Some(until));
    assert!(ep.is_valid_at(Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()));
    assert!(!ep.is_valid_at(Utc.with_ymd_and_hms(2027, 6, 1, 0, 0, 0).unwrap()));
}

#[test]
fn participant_at_limit_after_case_folding_survives_reopen() {
    // U+0130 lower-cases to two chars: 25 of them fold to the 50 char limit
    let raw = "\u{130}".repeat(25);
    let mut test = TestRegistry::sql();
    let p = participant(&raw);
    assert_eq!(p.value().chars().count(), 50);
    test.registry().service_groups().create("owner-1", &p, None).unwrap();
    assert!(smp_registry::ParticipantId::peppol("\u{130}".repeat(30)).is_err());

    test.reopen();
    assert!(test.registry().service_groups().contains(&participant(&raw)));
    assert_eq!(test.registry().service_groups().count(), 1);
}
