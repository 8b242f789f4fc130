//! Credential checks and ownership

use crate::common::*;
use std::sync::Arc;

fn registry() -> SmpRegistry {
    init_tracing();
    let users = StaticUserDirectory::new()
        .with_user("owner-1", "alice", "secret")
        .with_user("owner-2", "bob", "hunter2");
    let registry = SmpRegistry::builder()
        .user_directory(Arc::new(users))
        .open()
        .unwrap();
    registry
        .service_groups()
        .create("owner-1", &participant("9915:xxx"), None)
        .unwrap();
    registry
}

#[test]
fn owner_is_authorized() {
    let registry = registry();
    let group = registry
        .authorize(&Credentials::new("alice", "secret"), &participant("9915:XXX"))
        .unwrap();
    assert_eq!(group.owner_id(), "owner-1");
}

#[test]
fn wrong_password_is_unauthorized() {
    let registry = registry();
    let err = registry
        .authorize(&Credentials::new("alice", "nope"), &participant("9915:xxx"))
        .unwrap_err();
    assert!(err.is_unauthorized());
}

#[test]
fn other_owner_is_unauthorized() {
    let registry = registry();
    let err = registry
        .authorize(&Credentials::new("bob", "hunter2"), &participant("9915:xxx"))
        .unwrap_err();
    assert!(err.is_unauthorized());
}

#[test]
fn unknown_participant_is_not_found() {
    let registry = registry();
    let err = registry
        .authorize(&Credentials::new("alice", "secret"), &participant("9915:nobody"))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn no_directory_means_no_access() {
    let registry = SmpRegistry::ephemeral().unwrap();
    registry
        .service_groups()
        .create("owner-1", &participant("9915:xxx"), None)
        .unwrap();
    let err = registry
        .authorize(&Credentials::new("alice", "secret"), &participant("9915:xxx"))
        .unwrap_err();
    assert!(err.is_unauthorized());
}

#[test]
fn credentials_debug_hides_password() {
    let shown = format!("{:?}", Credentials::new("alice", "secret"));
    assert!(shown.contains("alice"));
    assert!(!shown.contains("secret"));
}
