//! Concurrent writers on the same service information entry

use crate::common::*;
use std::sync::{Arc, Barrier};
use std::thread;

const WRITERS: usize = 8;

fn profile(i: usize) -> String {
    format!("test-transport-{}", i)
}

fn concurrent_upserts(registry: Arc<SmpRegistry>) {
    let p = participant("9915:xxx");
    let d = doc_type("invoice");
    registry.service_groups().create("owner-1", &p, None).unwrap();

    let barrier = Arc::new(Barrier::new(WRITERS));
    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let registry = registry.clone();
            let barrier = barrier.clone();
            let (p, d) = (p.clone(), d.clone());
            thread::spawn(move || {
                barrier.wait();
                registry
                    .upsert_endpoint(
                        &p,
                        &d,
                        &process_id("billing"),
                        endpoint(&profile(i), "https://ap.example.org"),
                    )
                    .unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let stored = registry
        .service_information()
        .get_of_group_and_doc_type(&p, &d)
        .unwrap();
    let mut expected: Vec<String> = (0..WRITERS).map(profile).collect();
    expected.sort();
    assert_eq!(profiles_of(&stored, "billing"), expected);
}

#[test]
fn concurrent_upserts_keep_every_endpoint() {
    init_tracing();
    concurrent_upserts(Arc::new(SmpRegistry::ephemeral().unwrap()));
}

#[test]
fn concurrent_upserts_keep_every_endpoint_on_wal() {
    let test = TestRegistry::wal();
    let registry = Arc::new(
        SmpRegistry::builder()
            .path(test.path().join("shared"))
            .config(test.config.clone())
            .open()
            .unwrap(),
    );
    concurrent_upserts(registry);
}

#[test]
fn concurrent_and_serialized_upserts_agree() {
    init_tracing();
    let p = participant("9915:xxx");
    let d = doc_type("invoice");

    let serial = SmpRegistry::ephemeral().unwrap();
    serial.service_groups().create("owner-1", &p, None).unwrap();
    for i in 0..WRITERS {
        serial
            .upsert_endpoint(&p, &d, &process_id("billing"), endpoint(&profile(i), "https://ap.example.org"))
            .unwrap();
    }

    let concurrent = Arc::new(SmpRegistry::ephemeral().unwrap());
    concurrent_upserts(concurrent.clone());

    assert_eq!(state_of(&serial), state_of(&concurrent));
}

#[test]
fn concurrent_merges_never_interleave() {
    init_tracing();
    let registry = Arc::new(SmpRegistry::ephemeral().unwrap());
    let p = participant("9915:xxx");
    let d = doc_type("invoice");
    registry.service_groups().create("owner-1", &p, None).unwrap();

    let submissions: Vec<ServiceInformation> = (0..WRITERS)
        .map(|i| {
            let a = profile(i);
            let b = profile(i + 100);
            service_info(&p, &d, &[("A", &[a.as_str()]), ("B", &[b.as_str()])])
        })
        .collect();

    let barrier = Arc::new(Barrier::new(WRITERS));
    let handles: Vec<_> = submissions
        .iter()
        .cloned()
        .map(|si| {
            let registry = registry.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                registry.merge_service_information(si).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let stored = registry
        .service_information()
        .get_of_group_and_doc_type(&p, &d)
        .unwrap();
    assert!(
        submissions.contains(&stored),
        "stored tree must equal one whole submission"
    );
}

#[test]
fn readers_see_whole_trees_while_writers_merge() {
    init_tracing();
    let registry = Arc::new(SmpRegistry::ephemeral().unwrap());
    let p = participant("9915:xxx");
    let d = doc_type("invoice");
    registry.service_groups().create("owner-1", &p, None).unwrap();

    let small = service_info(&p, &d, &[("A", &[AS4])]);
    let large = service_info(&p, &d, &[("A", &[AS4, AS2]), ("B", &[START])]);
    registry.merge_service_information(small.clone()).unwrap();

    let writer = {
        let registry = registry.clone();
        let (small, large) = (small.clone(), large.clone());
        thread::spawn(move || {
            for i in 0..200 {
                let next = if i % 2 == 0 { large.clone() } else { small.clone() };
                registry.merge_service_information(next).unwrap();
            }
        })
    };

    for _ in 0..500 {
        let seen = registry
            .service_information()
            .get_of_group_and_doc_type(&p, &d)
            .unwrap();
        assert!(seen == small || seen == large);
    }
    writer.join().unwrap();
}

#[test]
fn exchange_under_contention_leaves_exactly_one_kind() {
    init_tracing();
    let registry = Arc::new(SmpRegistry::ephemeral().unwrap());
    let p = participant("9915:xxx");
    let d = doc_type("invoice");
    registry.service_groups().create("owner-1", &p, None).unwrap();

    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let registry = registry.clone();
            let (p, d) = (p.clone(), d.clone());
            thread::spawn(move || {
                for _ in 0..20 {
                    if i % 2 == 0 {
                        registry
                            .merge_service_information(service_info(&p, &d, &[("A", &[AS4])]))
                            .unwrap();
                    } else {
                        registry
                            .create_or_update_redirect(&p, &d, "https://smp2.example.org", "CN=SMP2", None, None)
                            .unwrap();
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let has_si = registry.service_information().get_of_group_and_doc_type(&p, &d).is_some();
    let has_redirect = registry.redirects().get_of_group_and_doc_type(&p, &d).is_some();
    assert!(has_si != has_redirect);
}
