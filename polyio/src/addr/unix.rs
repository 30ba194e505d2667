//! Unix-domain socket paths.

use std::{fmt, path::Path, str::FromStr};

use super::AddrParseError;

/// Longest path a `sockaddr_un` can carry.
pub const UNIX_PATH_MAX: usize = 108;

/// A Unix-domain socket path of at most [`UNIX_PATH_MAX`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct UnixPath {
    bytes: Vec<u8>,
}

impl UnixPath {
    /// The empty path.
    pub const NONE: UnixPath = UnixPath { bytes: Vec::new() };

    /// Build a path from raw bytes; fails when they exceed the
    /// `sockaddr_un` limit.
    pub fn from_bytes(bytes: &[u8]) -> Option<UnixPath> {
        if bytes.len() > UNIX_PATH_MAX {
            return None;
        }
        Some(UnixPath {
            bytes: bytes.to_vec(),
        })
    }

    /// Build a path from a filesystem path.
    #[cfg(unix)]
    pub fn from_path(path: &Path) -> Option<UnixPath> {
        use std::os::unix::ffi::OsStrExt;
        Self::from_bytes(path.as_os_str().as_bytes())
    }

    /// Build a path from a filesystem path.
    #[cfg(not(unix))]
    pub fn from_path(path: &Path) -> Option<UnixPath> {
        Self::from_bytes(path.to_str()?.as_bytes())
    }

    /// Parse text; fails only when it is longer than the limit.
    pub fn try_parse(text: &str) -> Option<UnixPath> {
        Self::from_bytes(text.as_bytes())
    }

    /// The raw path bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether this is the empty path.
    pub fn is_none(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl FromStr for UnixPath {
    type Err = AddrParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        UnixPath::try_parse(text).ok_or_else(|| AddrParseError::new("unix path", text))
    }
}

impl fmt::Display for UnixPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_path_is_none() {
        assert!(UnixPath::NONE.is_none());
        assert_eq!(UnixPath::try_parse("").unwrap(), UnixPath::NONE);
    }

    #[test]
    fn round_trips_text() {
        let path: UnixPath = "/tmp/polyio.sock".parse().unwrap();
        assert_eq!(path.to_string(), "/tmp/polyio.sock");
        assert_eq!(path.as_bytes(), b"/tmp/polyio.sock");
    }

    #[test]
    fn limits_to_sockaddr_un_capacity() {
        let longest = "x".repeat(UNIX_PATH_MAX);
        assert!(UnixPath::try_parse(&longest).is_some());
        let too_long = "x".repeat(UNIX_PATH_MAX + 1);
        assert!(UnixPath::try_parse(&too_long).is_none());
        assert!(too_long.parse::<UnixPath>().is_err());
    }
}
