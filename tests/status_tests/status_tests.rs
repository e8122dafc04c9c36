//! Status Code Tests
//!
//! Tests verify:
//! - Every error maps to its status
//! - Codes are stable and invertible
//! - Query answers (dirty, only-key) map to their own codes

use multikv::{Config, MainKeyState, MultiHashMap, MultiKvError, SetOptions, Status};

const ALL: [Status; 13] = [
    Status::Ok,
    Status::Dirty,
    Status::NotFound,
    Status::OnlyKey,
    Status::Deleted,
    Status::Expired,
    Status::AlreadyExists,
    Status::VersionMismatch,
    Status::ReadOnly,
    Status::GroupFull,
    Status::OutOfSpace,
    Status::InvalidHandle,
    Status::Config,
];

// =============================================================================
// Code Tests
// =============================================================================

#[test]
fn test_codes_are_invertible() {
    for status in ALL {
        assert_eq!(Status::from_code(status.code()), Some(status));
    }
    assert_eq!(Status::from_code(42), None);
}

#[test]
fn test_only_store_faults_are_failures() {
    let failures: Vec<_> = ALL.iter().filter(|s| s.is_failure()).collect();
    assert_eq!(
        failures,
        vec![&Status::OutOfSpace, &Status::InvalidHandle, &Status::Config]
    );
    assert!(Status::Ok.is_ok());
    assert!(!Status::Dirty.is_ok());
}

#[test]
fn test_error_mapping() {
    let cases = [
        (MultiKvError::NotFound, Status::NotFound),
        (MultiKvError::Deleted, Status::Deleted),
        (MultiKvError::Expired, Status::Expired),
        (MultiKvError::OnlyKey, Status::OnlyKey),
        (MultiKvError::AlreadyExists, Status::AlreadyExists),
        (
            MultiKvError::VersionMismatch {
                expected: 1,
                actual: 2,
            },
            Status::VersionMismatch,
        ),
        (MultiKvError::ReadOnly, Status::ReadOnly),
        (MultiKvError::GroupFull { limit: 3 }, Status::GroupFull),
        (
            MultiKvError::OutOfSpace {
                requested: 10,
                available: 0,
            },
            Status::OutOfSpace,
        ),
        (MultiKvError::InvalidHandle("x".into()), Status::InvalidHandle),
        (MultiKvError::Config("x".into()), Status::Config),
    ];
    for (error, status) in cases {
        assert_eq!(Status::from(&error), status, "{}", error);
    }
}

#[test]
fn test_display_uses_name() {
    assert_eq!(Status::VersionMismatch.to_string(), "VERSION_MISMATCH");
    assert_eq!(Status::OnlyKey.to_string(), "ONLY_KEY");
}

// =============================================================================
// Query Answer Tests
// =============================================================================

#[test]
fn test_query_answers_from_store() {
    let config = Config::builder()
        .shard_count(2)
        .total_size(64 * 1024)
        .data_size(32)
        .build();
    let store = MultiHashMap::open(config).unwrap();

    store.set_only_key(b"placeholder").unwrap();
    store.set(b"team", b"a", b"v", &SetOptions::new()).unwrap();

    assert_eq!(
        Status::from_main_key(&store.check_main_key(b"placeholder")),
        Status::OnlyKey
    );
    assert_eq!(
        Status::from_main_key(&store.check_main_key(b"team")),
        Status::Ok
    );
    assert_eq!(
        Status::from_main_key(&store.check_main_key(b"missing")),
        Status::NotFound
    );
    assert_eq!(store.check_main_key(b"team"), Ok(MainKeyState::Data { records: 1 }));

    assert_eq!(Status::from_dirty(&store.check_dirty(b"team", b"a")), Status::Dirty);
    store.set_clean(b"team", b"a").unwrap();
    assert_eq!(Status::from_dirty(&store.check_dirty(b"team", b"a")), Status::Ok);
    assert_eq!(
        Status::from_dirty(&store.check_dirty(b"team", b"zz")),
        Status::NotFound
    );

    assert_eq!(
        Status::from_result(&store.get(b"team", b"zz")),
        Status::NotFound
    );
}
