//! Hierarchical configuration keys
//!
//! A configuration slot lives at one of two places under the root namespace:
//!
//! ```text
//! <root>/<name>             scalar setting       Key { group: "",        name }
//! <root>/<group>/<member>   collection member    Key { group: "endpoints", name: "e1" }
//! ```
//!
//! Keys are plain values; two keys are the same slot iff they are structurally equal.


use std::fmt;

use bytes::Bytes;

use crate::constants::INVALID_KEY_GROUP;
use crate::constants::INVALID_KEY_NAME;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    /// Collection name, empty for top-level scalars
    pub group: String,
    /// Slot name, empty only for group prefix queries (see [`Key::prefix`])
    pub name: String,
}

impl Key {
    /// Top-level scalar setting stored at `<root>/<name>`
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            group: String::new(),
            name: name.into(),
        }
    }

    /// Member of a named collection stored at `<root>/<group>/<name>`
    pub fn member(
        group: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }

    /// Prefix key addressing a whole collection, used with `Backend::list`
    pub fn prefix(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: String::new(),
        }
    }

    /// Sentinel produced when a store path cannot be mapped to a slot
    pub fn invalid() -> Self {
        Self::member(INVALID_KEY_GROUP, INVALID_KEY_NAME)
    }

    pub fn is_invalid(&self) -> bool {
        self.group == INVALID_KEY_GROUP && self.name == INVALID_KEY_NAME
    }

    pub fn is_scalar(&self) -> bool {
        self.group.is_empty()
    }

    /// Builds the full store path: root, then group, then name.
    ///
    /// Empty segments are skipped and stray separators are collapsed, so
    /// `Key::scalar("bind").join("/cfg/", '/') == "/cfg/bind"`.
    pub fn join(
        &self,
        root: &str,
        separator: char,
    ) -> String {
        let mut path = root.trim_end_matches(separator).to_string();
        for segment in [self.group.as_str(), self.name.as_str()] {
            let segment = segment.trim_matches(separator);
            if segment.is_empty() {
                continue;
            }
            path.push(separator);
            path.push_str(segment);
        }
        path
    }

    /// Inverse of [`Key::join`].
    ///
    /// The root prefix is stripped; a single remaining segment is a scalar, otherwise the
    /// last two segments are taken as group and name. Paths outside the root or with
    /// nothing after it map to [`Key::invalid`] instead of failing.
    pub fn parse_from_path(
        path: &str,
        root: &str,
        separator: char,
    ) -> Self {
        let root = root.trim_end_matches(separator);
        let rest = match path.strip_prefix(root) {
            Some(rest) => rest,
            None => return Self::invalid(),
        };
        // "/cfgx/name" must not match root "/cfg"
        if !root.is_empty() && !rest.is_empty() && !rest.starts_with(separator) {
            return Self::invalid();
        }

        let segments: Vec<&str> = rest.split(separator).filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] => Self::invalid(),
            [name] => Self::scalar(*name),
            [.., group, name] => Self::member(*group, *name),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.group, self.name)
        }
    }
}

/// Last segment of a raw store path.
pub(crate) fn basename(
    path: &str,
    separator: char,
) -> &str {
    path.trim_end_matches(separator)
        .rsplit(separator)
        .next()
        .unwrap_or_default()
}

/// One stored entry as returned by `get`/`list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub key: Key,
    pub value: Bytes,
}

impl Pair {
    pub fn new(
        key: Key,
        value: impl Into<Bytes>,
    ) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }

    /// Value as UTF-8, if it is
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }
}
