//! # Version Selection
//!
//! Versions of a project are ordered by creation time, oldest first, and
//! addressed either by that zero-based ordinal or by the word `latest`.
//! `latest` always means the most recently created version.

use thiserror::Error;

/// How a request addresses one version of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSelector {
    /// The most recently created version.
    Latest,
    /// Zero-based position in creation order (0 = first upload).
    Index(usize),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("version selector must be \"latest\" or a non-negative integer, got {0:?}")]
pub struct InvalidSelector(pub String);

impl VersionSelector {
    /// Resolve against the number of versions a project has.
    ///
    /// Returns `None` when the project has no versions or the index is
    /// past the end.
    pub fn resolve(&self, len: usize) -> Option<usize> {
        match *self {
            Self::Latest => len.checked_sub(1),
            Self::Index(i) if i < len => Some(i),
            Self::Index(_) => None,
        }
    }
}

impl std::str::FromStr for VersionSelector {
    type Err = InvalidSelector;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("latest") {
            return Ok(Self::Latest);
        }
        s.parse::<usize>()
            .map(Self::Index)
            .map_err(|_| InvalidSelector(s.to_string()))
    }
}

impl std::fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Index(i) => write!(f, "{i}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_latest_and_indices() {
        assert_eq!("latest".parse::<VersionSelector>().unwrap(), VersionSelector::Latest);
        assert_eq!("LATEST".parse::<VersionSelector>().unwrap(), VersionSelector::Latest);
        assert_eq!("0".parse::<VersionSelector>().unwrap(), VersionSelector::Index(0));
        assert_eq!("12".parse::<VersionSelector>().unwrap(), VersionSelector::Index(12));
    }

    #[test]
    fn rejects_garbage() {
        assert!("-1".parse::<VersionSelector>().is_err());
        assert!("newest".parse::<VersionSelector>().is_err());
        assert!("".parse::<VersionSelector>().is_err());
    }

    #[test]
    fn latest_is_last_created() {
        assert_eq!(VersionSelector::Latest.resolve(3), Some(2));
        assert_eq!(VersionSelector::Latest.resolve(1), Some(0));
        assert_eq!(VersionSelector::Latest.resolve(0), None);
    }

    #[test]
    fn index_bounds_are_exclusive() {
        assert_eq!(VersionSelector::Index(0).resolve(3), Some(0));
        assert_eq!(VersionSelector::Index(2).resolve(3), Some(2));
        assert_eq!(VersionSelector::Index(3).resolve(3), None);
        assert_eq!(VersionSelector::Index(0).resolve(0), None);
    }
}
