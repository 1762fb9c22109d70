//! Absolute, normalized paths in the remote namespace.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{ClientError, Result};

/// An absolute path inside the remote namespace.
///
/// Always starts with `/`, never ends with one (except the root itself), and
/// carries no empty, `.` or `..` components. Backends hand resolved `DfsPath`
/// values back in listings so callers never reconstruct paths from strings.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DfsPath(String);

impl DfsPath {
    /// Parse and normalize a raw path. Redundant separators collapse, a
    /// trailing slash is dropped; anything relative or containing `.`/`..`
    /// is rejected.
    pub fn new(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(ClientError::InvalidPath("empty path".into()));
        }
        if !raw.starts_with('/') {
            return Err(ClientError::InvalidPath(format!(
                "{raw}: not absolute (must start with '/')"
            )));
        }
        let mut normalized = String::with_capacity(raw.len());
        for part in raw.split('/') {
            match part {
                "" => continue,
                "." | ".." => {
                    return Err(ClientError::InvalidPath(format!(
                        "{raw}: '.' and '..' components are not allowed"
                    )));
                }
                _ => {
                    normalized.push('/');
                    normalized.push_str(part);
                }
            }
        }
        if normalized.is_empty() {
            normalized.push('/');
        }
        Ok(Self(normalized))
    }

    /// The namespace root, `/`.
    pub fn root() -> Self {
        Self("/".into())
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final component; empty for the root.
    pub fn name(&self) -> &str {
        match self.0.rfind('/') {
            Some(i) => &self.0[i + 1..],
            None => "",
        }
    }

    /// Parent directory; `None` for the root.
    pub fn parent(&self) -> Option<DfsPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(i) => Some(Self(self.0[..i].to_string())),
            None => None,
        }
    }

    /// Append one or more components. The relative part is validated with the
    /// same rules as [`DfsPath::new`].
    pub fn join(&self, rel: &str) -> Result<DfsPath> {
        Self::new(&format!("{}/{}", self.0, rel))
    }

    /// Rebuild from a string already in normalized form. Backends use this
    /// for keys they normalized on the way in.
    pub(crate) fn from_normalized(s: String) -> Self {
        debug_assert!(Self::new(&s).map(|p| p.0 == s).unwrap_or(false));
        Self(s)
    }
}

impl fmt::Display for DfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for DfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DfsPath({:?})", self.0)
    }
}

impl FromStr for DfsPath {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_separators_and_trailing_slash() {
        assert_eq!(DfsPath::new("/a//b/").unwrap().as_str(), "/a/b");
        assert_eq!(DfsPath::new("///").unwrap().as_str(), "/");
        assert_eq!(DfsPath::new("/xiyou/huaguoshan").unwrap().as_str(), "/xiyou/huaguoshan");
    }

    #[test]
    fn rejects_relative_and_dot_components() {
        assert!(DfsPath::new("").is_err());
        assert!(DfsPath::new("a/b").is_err());
        assert!(DfsPath::new("/a/./b").is_err());
        assert!(DfsPath::new("/a/../b").is_err());
    }

    #[test]
    fn name_and_parent() {
        let p = DfsPath::new("/user/data/file.bin").unwrap();
        assert_eq!(p.name(), "file.bin");
        assert_eq!(p.parent().unwrap().as_str(), "/user/data");

        let top = DfsPath::new("/top").unwrap();
        assert_eq!(top.parent().unwrap(), DfsPath::root());
        assert!(DfsPath::root().parent().is_none());
        assert_eq!(DfsPath::root().name(), "");
    }

    #[test]
    fn join_builds_children() {
        let dir = DfsPath::new("/a").unwrap();
        assert_eq!(dir.join("b").unwrap().as_str(), "/a/b");
        assert_eq!(DfsPath::root().join("b").unwrap().as_str(), "/b");
        assert_eq!(dir.join("b/c").unwrap().as_str(), "/a/b/c");
        assert!(dir.join("..").is_err());
    }

    #[test]
    fn parses_from_str() {
        let p: DfsPath = "/a/b/".parse().unwrap();
        assert_eq!(p.as_str(), "/a/b");
        assert!("relative".parse::<DfsPath>().is_err());
    }
}
