use super::{RawEnv, Version};
use std::mem::size_of;

#[test]
fn test_table_sizes_grow_with_version() {
    let sizes: Vec<usize> = Version::ALL.iter().map(|v| v.table_size()).collect();
    for pair in sizes.windows(2) {
        assert!(pair[0] <= pair[1]);
    }
    assert_eq!(Version::LATEST.table_size(), size_of::<RawEnv>());
    assert!(Version::V25.table_size() < Version::V26.table_size());
}

#[test]
fn test_version_for_table_size() {
    for v in [Version::V25, Version::V26, Version::V27] {
        assert_eq!(Version::for_table_size(v.table_size() as isize), Some(v));
    }
    assert_eq!(Version::for_table_size(Version::V28.table_size() as isize), Some(Version::V29));
    assert_eq!(Version::for_table_size(8), None);
    assert_eq!(Version::for_table_size(-1), None);
}

#[test]
fn test_from_major() {
    assert_eq!(Version::from_major(27), Some(Version::V27));
    assert_eq!(Version::from_major(24), None);
    assert_eq!(Version::V26.to_string(), "Emacs 26");
}
