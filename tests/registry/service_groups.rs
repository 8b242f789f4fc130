//! Service group lifecycle, case folding, cascade, audit

use crate::common::*;
use std::sync::Arc;

#[test]
fn participant_value_is_case_insensitive() {
    let registry = SmpRegistry::ephemeral().unwrap();
    registry
        .service_groups()
        .create("owner-1", &participant("9915:xxx"), None)
        .unwrap();

    assert!(registry.service_groups().contains(&participant("9915:XXX")));
    let upper = participant("9915:XXX");
    assert_eq!(
        registry.service_groups().get(&upper).unwrap().id(),
        "iso6523-actorid-upis::9915:xxx"
    );

    // And the other direction
    registry
        .service_groups()
        .create("owner-1", &participant("9915:ABC"), None)
        .unwrap();
    assert!(registry.service_groups().contains(&participant("9915:abc")));
}

#[test]
fn case_folding_survives_reopen() {
    let mut test = TestRegistry::wal();
    test.registry()
        .service_groups()
        .create("owner-1", &participant("9915:MixedCase"), None)
        .unwrap();
    test.reopen();
    assert!(test
        .registry()
        .service_groups()
        .contains(&participant("9915:mixedcase")));
}

#[test]
fn update_changes_owner_only_when_different() {
    let registry = SmpRegistry::ephemeral().unwrap();
    let p = participant("9915:xxx");
    registry.service_groups().create("owner-1", &p, None).unwrap();

    assert_eq!(
        registry.service_groups().update(&p, "owner-1", None).unwrap(),
        Change::Unchanged
    );
    assert_eq!(
        registry.service_groups().update(&p, "owner-2", None).unwrap(),
        Change::Changed
    );
    assert_eq!(registry.service_groups().count_of_owner("owner-2"), 1);
    assert_eq!(registry.service_groups().count_of_owner("owner-1"), 0);
}

#[test]
fn delete_cascades_to_service_information_and_redirects() {
    for test in [TestRegistry::wal(), TestRegistry::sql()] {
        let registry = test.registry();
        let p = participant("9915:xxx");
        let other = participant("9915:yyy");
        for group in [&p, &other] {
            registry.service_groups().create("owner-1", group, None).unwrap();
        }

        registry
            .merge_service_information(service_info(&p, &doc_type("invoice"), &[("A", &[AS4])]))
            .unwrap();
        registry
            .merge_service_information(service_info(&p, &doc_type("order"), &[("A", &[AS2])]))
            .unwrap();
        registry
            .create_or_update_redirect(&p, &doc_type("catalogue"), "https://smp2.example.org", "CN=SMP2", None, None)
            .unwrap();
        registry
            .merge_service_information(service_info(&other, &doc_type("invoice"), &[("A", &[AS4])]))
            .unwrap();

        registry.service_groups().delete(&p).unwrap();

        assert!(registry.service_information().get_all_of_group(&p).is_empty());
        assert!(registry.redirects().get_all_of_group(&p).is_empty());
        assert_eq!(registry.service_information().get_all_of_group(&other).len(), 1);
        assert_eq!(registry.service_groups().all_ids(), vec![other.uri()]);
    }
}

#[test]
fn audit_sees_every_outcome() {
    let audit = RecordingAuditSink::new();
    let registry = SmpRegistry::builder()
        .audit(audit.clone())
        .open()
        .unwrap();
    let p = participant("9915:xxx");

    registry.service_groups().create("owner-1", &p, None).unwrap();
    assert!(registry.service_groups().create("owner-1", &p, None).is_err());
    registry.service_groups().update(&p, "owner-2", None).unwrap();
    registry.service_groups().delete(&p).unwrap();

    let events = audit.events();
    let summary: Vec<_> = events
        .iter()
        .map(|e| (e.kind, e.action, e.ok))
        .collect();
    assert_eq!(
        summary,
        vec![
            (EntityKind::ServiceGroup, ActionType::Create, true),
            (EntityKind::ServiceGroup, ActionType::Create, false),
            (EntityKind::ServiceGroup, ActionType::Update, true),
            (EntityKind::ServiceGroup, ActionType::Delete, true),
        ]
    );
    assert!(events.iter().all(|e| e.id == p.uri()));
}

#[test]
fn managers_can_be_shared_across_threads() {
    let registry = Arc::new(SmpRegistry::ephemeral().unwrap());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let groups = registry.service_groups().clone();
            std::thread::spawn(move || {
                groups
                    .create("owner-1", &participant(&format!("9915:p{}", i)), None)
                    .unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(registry.service_groups().count(), 8);
    assert_eq!(registry.service_groups().all_of_owner("owner-1").len(), 8);
}
