use crate::ffi::Version;

/// What catch-and-report does with errors it cannot map onto a host error.
///
/// With boxing off they become a generic `error` signal. With boxing on the
/// native error is stored in a user pointer and signalled with a dedicated
/// condition, so a caller on the native side can recover it unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Boxing {
    Off,
    On,
}

impl Boxing {
    /// Selected by the `exception-boxing` cargo feature.
    pub const DEFAULT: Boxing = if cfg!(feature = "exception-boxing") {
        Boxing::On
    } else {
        Boxing::Off
    };

    pub fn is_on(self) -> bool {
        self == Boxing::On
    }
}

impl Default for Boxing {
    fn default() -> Self {
        Boxing::DEFAULT
    }
}

/// Module-wide settings used by [`crate::module::init_module`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    pub min_version: Version,
    pub boxing: Boxing,
}

impl Config {
    pub const fn new() -> Self {
        Self {
            min_version: Version::OLDEST,
            boxing: Boxing::DEFAULT,
        }
    }

    pub const fn min_version(mut self, version: Version) -> Self {
        self.min_version = version;
        self
    }

    pub const fn boxing(mut self, boxing: Boxing) -> Self {
        self.boxing = boxing;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
