//! Public API tests for the shared value types.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use pathwatch_core::{
    Charset, FsError, Initiator, PathElement, Update, UpdateKind, compare_entries, sort_siblings,
};

fn t(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

#[test]
fn sibling_order_is_total_and_deterministic() {
    let mut entries = vec![
        PathElement::file("/r/zz.txt", t(0)),
        PathElement::directory("/r/Dir_B", vec![]),
        PathElement::file("/r/Aa.txt", t(0)),
        PathElement::directory("/r/dir_a_z", vec![]),
    ];
    sort_siblings(&mut entries);
    let names: Vec<_> = entries.iter().map(PathElement::name).collect();
    assert_eq!(names, vec!["dir_a_z", "Dir_B", "Aa.txt", "zz.txt"]);

    // Case-only name differences still order deterministically.
    assert_ne!(
        compare_entries(false, "Readme", false, "readme"),
        std::cmp::Ordering::Equal
    );
}

#[test]
fn nested_directories_sort_on_construction() {
    let tree = PathElement::directory(
        "/r",
        vec![
            PathElement::file("/r/b.txt", t(1)),
            PathElement::directory(
                "/r/sub",
                vec![
                    PathElement::file("/r/sub/y", t(1)),
                    PathElement::file("/r/sub/X", t(1)),
                ],
            ),
        ],
    );
    assert_eq!(tree.children[0].name(), "sub");
    let inner: Vec<_> = tree.children[0].children.iter().map(PathElement::name).collect();
    assert_eq!(inner, vec!["X", "y"]);
    assert_eq!(tree.element_count(), 4);
}

#[test]
fn charsets_round_trip_and_reject_invalid_input() {
    for charset in [Charset::Utf8, Charset::Utf16Le, Charset::Utf16Be] {
        let bytes = charset.encode("naïve 世界 text").unwrap();
        assert_eq!(charset.decode(&bytes).unwrap(), "naïve 世界 text");
    }

    // Latin-1 cannot carry characters above U+00FF.
    assert!(Charset::Latin1.encode("漢").is_none());
    assert_eq!(Charset::Latin1.encode("café").map(|b| b.len()), Some(4));

    // Odd-length input is not valid UTF-16.
    assert!(Charset::Utf16Le.decode(&[0x68, 0x00, 0x65]).is_none());
}

#[test]
fn updates_carry_initiator_identity() {
    let op = Initiator::new("op-7");
    let update = Update::new("/base", "a/b.txt", Some(op.clone()), UpdateKind::Creation);

    assert_eq!(update.path(), std::path::PathBuf::from("/base/a/b.txt"));
    assert!(update.caused_by(&op));
    assert!(!update.caused_by(&Initiator::external()));

    let corrective = Update::new("/base", "a", None, UpdateKind::Deletion);
    assert!(!corrective.caused_by(&op));
}

#[test]
fn io_errors_classify_by_kind() {
    let classified = FsError::io(
        "/p",
        std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
    );
    assert!(matches!(classified, FsError::PermissionDenied { .. }));
    assert!(!classified.is_not_found());
    assert!(classified.to_string().contains("/p"));
}
