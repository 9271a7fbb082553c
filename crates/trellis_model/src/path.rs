//! Hierarchical dotted addressing
//!
//! Every node in the model is addressed by a [`ModelPath`]: an immutable
//! sequence of name segments joined by `'.'`. The empty path is the single
//! shared root. Two paths are equal iff their segment sequences are equal;
//! the rendered string form is a cache and excluded from equality.
//!
//! ```ignore
//! use trellis_model::path::ModelPath;
//!
//! let components = ModelPath::parse("components.main");
//! assert_eq!(components.parent(), Some(ModelPath::parse("components")));
//! assert!(components.is_direct_descendant(&ModelPath::parse("components")));
//! ```

use crate::error::{ModelError, Result};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Segment separator in rendered path strings.
pub const SEPARATOR: char = '.';

/// Placeholder rendered for the root path, which has no segments.
const ROOT_DISPLAY: &str = "<root>";

/// An immutable, interned hierarchical path.
#[derive(Clone)]
pub struct ModelPath {
    /// Name segments, root-first.
    segments: Arc<[Box<str>]>,
    /// Cached separator-joined form. Not part of equality.
    display: Arc<str>,
}

impl ModelPath {
    /// The shared root path (no segments).
    pub fn root() -> Self {
        Self::from_segments(Vec::new())
    }

    /// Parses a path from its string form. Empty segments collapse, so
    /// `"a..b"` and `".a.b."` both address `a.b`; an all-separator string
    /// addresses the root.
    pub fn parse(path: &str) -> Self {
        Self::from_segments(
            path.split(SEPARATOR)
                .filter(|segment| !segment.is_empty())
                .map(Box::from)
                .collect(),
        )
    }

    fn from_segments(segments: Vec<Box<str>>) -> Self {
        let display = segments.join(&SEPARATOR.to_string());
        Self {
            segments: segments.into(),
            display: display.into(),
        }
    }

    /// The path addressing `name` directly under this path.
    ///
    /// A name containing the separator (or an empty name) is a usage error:
    /// parent derivation could not reproduce this path.
    pub fn child(&self, name: &str) -> Result<ModelPath> {
        if name.is_empty() || name.contains(SEPARATOR) {
            return Err(ModelError::MalformedName {
                name: name.to_string(),
            });
        }
        let mut segments: Vec<Box<str>> = self.segments.to_vec();
        segments.push(Box::from(name));
        Ok(Self::from_segments(segments))
    }

    /// The parent path; `None` for the root.
    pub fn parent(&self) -> Option<ModelPath> {
        match self.segments.len() {
            0 => None,
            n => Some(Self::from_segments(self.segments[..n - 1].to_vec())),
        }
    }

    /// The last segment; empty for the root.
    pub fn name(&self) -> &str {
        self.segments.last().map_or("", |segment| segment)
    }

    /// Number of segments; 0 for the root.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether this path has exactly one more segment than `other` and
    /// `other` is its parent.
    pub fn is_direct_descendant(&self, other: &ModelPath) -> bool {
        self.segments.len() == other.segments.len() + 1 && self.parent().as_ref() == Some(other)
    }

    /// Whether `other` is a strict prefix of this path.
    pub fn is_descendant(&self, other: &ModelPath) -> bool {
        self.segments.len() > other.segments.len()
            && self.segments[..other.segments.len()] == other.segments[..]
    }
}

impl PartialEq for ModelPath {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for ModelPath {}

impl Hash for ModelPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments.hash(state);
    }
}

impl fmt::Display for ModelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str(ROOT_DISPLAY)
        } else {
            f.write_str(&self.display)
        }
    }
}

impl fmt::Debug for ModelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelPath({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for s in ["a", "a.b", "components.main.sources"] {
            assert_eq!(ModelPath::parse(s).to_string(), s);
        }
    }

    #[test]
    fn test_empty_segments_collapse() {
        assert_eq!(ModelPath::parse("a..b"), ModelPath::parse("a.b"));
        assert_eq!(ModelPath::parse(".a.b."), ModelPath::parse("a.b"));
        assert_eq!(ModelPath::parse("..."), ModelPath::root());
    }

    #[test]
    fn test_root_renders_placeholder() {
        assert_eq!(ModelPath::root().to_string(), "<root>");
        assert_ne!(ModelPath::root().to_string(), "");
    }

    #[test]
    fn test_child_then_parent_round_trips() {
        let base = ModelPath::parse("a.b");
        let child = base.child("x").unwrap();
        assert_eq!(child.to_string(), "a.b.x");
        assert_eq!(child.parent(), Some(base.clone()));
        assert_eq!(child.parent().unwrap().to_string(), base.to_string());
    }

    #[test]
    fn test_child_rejects_malformed_names() {
        assert!(ModelPath::root().child("").is_err());
        assert!(ModelPath::root().child("a.b").is_err());
    }

    #[test]
    fn test_root_has_no_parent() {
        assert_eq!(ModelPath::root().parent(), None);
        assert_eq!(ModelPath::parse("a").parent(), Some(ModelPath::root()));
    }

    #[test]
    fn test_direct_descendant() {
        let a = ModelPath::parse("a");
        assert!(ModelPath::parse("a.b").is_direct_descendant(&a));
        assert!(!ModelPath::parse("a.b.c").is_direct_descendant(&a));
        assert!(!a.is_direct_descendant(&a));
        assert!(a.is_direct_descendant(&ModelPath::root()));
    }

    #[test]
    fn test_descendant() {
        let a = ModelPath::parse("a");
        assert!(ModelPath::parse("a.b.c").is_descendant(&a));
        assert!(!ModelPath::parse("ab.c").is_descendant(&a));
        assert!(!a.is_descendant(&a));
    }

    #[test]
    fn test_equality_ignores_display_cache() {
        // Parent derived from a child equals the directly parsed path.
        let derived = ModelPath::parse("a.b.c").parent().unwrap();
        assert_eq!(derived, ModelPath::parse("a.b"));
        let mut set = std::collections::HashSet::new();
        set.insert(derived);
        assert!(set.contains(&ModelPath::parse("a.b")));
    }

    #[test]
    fn test_name() {
        assert_eq!(ModelPath::parse("a.b").name(), "b");
        assert_eq!(ModelPath::root().name(), "");
    }
}
