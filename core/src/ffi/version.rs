use std::fmt;
use std::mem::{offset_of, size_of};

use super::RawEnv;

/// Host API versions this crate knows the table layout of.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Version {
    V25 = 25,
    V26 = 26,
    V27 = 27,
    V28 = 28,
    V29 = 29,
}

impl Version {
    pub const OLDEST: Version = Version::V25;
    pub const LATEST: Version = Version::V29;
    pub const ALL: [Version; 5] = [Version::V25, Version::V26, Version::V27, Version::V28, Version::V29];

    pub const fn major(self) -> u32 {
        self as u32
    }

    /// Byte size of the environment table a host of this version hands out.
    pub const fn table_size(self) -> usize {
        match self {
            Version::V25 => offset_of!(RawEnv, should_quit),
            Version::V26 => offset_of!(RawEnv, process_input),
            Version::V27 => offset_of!(RawEnv, get_function_finalizer),
            Version::V28 | Version::V29 => size_of::<RawEnv>(),
        }
    }

    pub fn from_major(major: u32) -> Option<Version> {
        Self::ALL.into_iter().find(|v| v.major() == major)
    }

    /// Newest version whose table fits in `size` bytes.
    pub fn for_table_size(size: isize) -> Option<Version> {
        let size = usize::try_from(size).ok()?;
        Self::ALL.into_iter().rev().find(|v| v.table_size() <= size)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Emacs {}", self.major())
    }
}
