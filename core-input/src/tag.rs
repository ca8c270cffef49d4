//! Minimal stream metadata.
//!
//! Producers attach a [`Tag`] when the source reports metadata out of band,
//! e.g. the current title of an internet radio stream. The consumer picks it
//! up once through `read_tag`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagType {
    Artist,
    Album,
    Title,
    Genre,
    /// Station or stream name
    Name,
    Comment,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    items: Vec<(TagType, String)>,
}

impl Tag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an item. Empty values are ignored.
    pub fn with(mut self, tag_type: TagType, value: impl Into<String>) -> Self {
        self.add(tag_type, value);
        self
    }

    pub fn add(&mut self, tag_type: TagType, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.items.push((tag_type, value));
        }
    }

    /// First value of the given type.
    pub fn get(&self, tag_type: TagType) -> Option<&str> {
        self.items
            .iter()
            .find(|(t, _)| *t == tag_type)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (TagType, &str)> {
        self.items.iter().map(|(t, v)| (*t, v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
