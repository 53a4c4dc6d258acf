//! Tags: key/value dimensions attached to a meter.

use std::fmt;

/// An immutable key/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    key: String,
    value: String,
}

impl Tag {
    /// Create a tag.
    pub fn of(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Tag key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Tag value
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// A set of tags with unique keys.
///
/// Tags are kept sorted by key, so two sets holding the same pairs compare
/// and hash equal regardless of insertion order. Adding a tag whose key is
/// already present replaces the old value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tags {
    tags: Vec<Tag>,
}

impl Tags {
    /// The empty tag set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a tag set from key/value pairs.
    pub fn of<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        pairs
            .into_iter()
            .map(|(k, v)| Tag::of(k, v))
            .collect()
    }

    /// Return a copy with one more tag.
    pub fn and(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(Tag::of(key, value));
        self
    }

    /// Return a copy merged with `other`; `other` wins on key collisions.
    pub fn and_tags(mut self, other: &Tags) -> Self {
        for tag in &other.tags {
            self.insert(tag.clone());
        }
        self
    }

    /// Insert a tag, replacing any tag with the same key.
    pub fn insert(&mut self, tag: Tag) {
        match self.tags.binary_search_by(|t| t.key.as_str().cmp(&tag.key)) {
            Ok(i) => self.tags[i] = tag,
            Err(i) => self.tags.insert(i, tag),
        }
    }

    /// Value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags
            .binary_search_by(|t| t.key.as_str().cmp(key))
            .ok()
            .map(|i| self.tags[i].value.as_str())
    }

    /// True if every tag in `other` is present here with the same value.
    pub fn contains_all(&self, other: &Tags) -> bool {
        other
            .iter()
            .all(|tag| self.get(tag.key()) == Some(tag.value()))
    }

    /// Iterate in key order.
    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl FromIterator<Tag> for Tags {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        let mut tags = Tags::empty();
        for tag in iter {
            tags.insert(tag);
        }
        tags
    }
}

impl FromIterator<(String, String)> for Tags {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        iter.into_iter().map(|(k, v)| Tag::of(k, v)).collect()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Tags {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Tags::of(pairs)
    }
}

impl<'a> IntoIterator for &'a Tags {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, tag) in self.tags.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{tag}")?;
        }
        f.write_str("}")
    }
}
