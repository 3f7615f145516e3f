//! Message queue and item formatting.

use std::sync::Arc;

/// Ordered, immutable sequence of items to dispatch.
///
/// Cloning is cheap: the items live behind an `Arc`, so a run can take its
/// own snapshot at start time while the engine keeps the queue for later runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageQueue {
    items: Arc<[String]>,
}

impl MessageQueue {
    /// Build a queue from already-parsed items.
    #[must_use]
    pub fn new(items: Vec<String>) -> Self {
        Self {
            items: items.into(),
        }
    }

    /// Build a queue from raw line-oriented text.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self::new(parse_lines(text))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.items.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }
}

/// Split text into trimmed, non-blank lines, preserving order.
#[must_use]
pub fn parse_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Format an outgoing message: `trim(prefix + " " + item)`.
#[must_use]
pub fn format_item(prefix: &str, item: &str) -> String {
    format!("{prefix} {item}").trim().to_string()
}
