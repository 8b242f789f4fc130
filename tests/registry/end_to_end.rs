//! End-to-end lifecycle on every backend

use crate::common::*;

fn lifecycle(registry: &SmpRegistry) {
    let p = participant("9915:xxx");
    let invoice = doc_type("invoice");

    registry
        .service_groups()
        .create("owner-1", &p, None)
        .unwrap();

    let submitted = service_info(&p, &invoice, &[("billing", &[AS4])]);
    assert_eq!(
        registry.merge_service_information(submitted.clone()).unwrap(),
        Change::Changed
    );

    let stored = registry
        .service_information()
        .get_of_group_and_doc_type(&p, &invoice)
        .expect("service information must be stored");
    assert_eq!(stored, submitted);
    assert!(registry
        .service_information()
        .find(&p, &invoice, &process_id("billing"), AS4)
        .is_some());

    assert_eq!(
        registry.service_information().delete(&p, &invoice).unwrap(),
        Change::Changed
    );
    assert!(registry
        .service_information()
        .get_of_group_and_doc_type(&p, &invoice)
        .is_none());

    assert_eq!(registry.service_groups().delete(&p).unwrap(), Change::Changed);
    assert_eq!(
        registry.service_groups().delete(&p).unwrap(),
        Change::Unchanged
    );
    assert_eq!(registry.service_groups().count(), 0);
}

#[test]
fn lifecycle_in_memory() {
    init_tracing();
    lifecycle(&SmpRegistry::ephemeral().unwrap());
}

#[test]
fn lifecycle_on_wal_backend() {
    let test = TestRegistry::wal();
    lifecycle(test.registry());
}

#[test]
fn lifecycle_on_sql_backend() {
    let test = TestRegistry::sql();
    lifecycle(test.registry());
}

#[test]
fn create_then_get_returns_owner_and_extension() {
    for test in [TestRegistry::wal(), TestRegistry::sql()] {
        let registry = test.registry();
        let p = participant("0088:5798000000001");
        registry
            .service_groups()
            .create("owner-1", &p, Some("<Extension>x</Extension>".into()))
            .unwrap();

        let group = registry.service_groups().get(&p).unwrap();
        assert_eq!(group.owner_id(), "owner-1");
        assert_eq!(group.extension.as_deref(), Some("<Extension>x</Extension>"));

        let err = registry
            .service_groups()
            .create("owner-1", &p, None)
            .unwrap_err();
        assert!(err.is_duplicate());
    }
}
