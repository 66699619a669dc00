//! Front-matter splitting
//!
//! A post starts with an optional YAML block fenced by `---` lines. The
//! splitter never fails: anything it cannot make sense of is handed back
//! untouched as body content.

use indexmap::IndexMap;
use serde_yaml::Value;

const FENCE: &str = "---";
const YAML_END: &str = "...";

/// Key/value block and remaining body of a source file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    /// Declared keys in file order, values rendered as strings
    pub data: IndexMap<String, String>,
    /// Everything after the closing fence
    pub content: String,
}

impl FrontMatter {
    /// Split raw file text into front-matter data and body
    pub fn split(raw: &str) -> Self {
        let text = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        let Some((block, body)) = locate_block(text) else {
            return Self::unfenced(raw);
        };

        match parse_block(block) {
            Some(data) => Self {
                data,
                content: body.to_string(),
            },
            None => Self::unfenced(raw),
        }
    }

    /// Whether the file declared any front-matter keys
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn unfenced(raw: &str) -> Self {
        Self {
            data: IndexMap::new(),
            content: raw.to_string(),
        }
    }
}

/// Find the fenced block at the top of `text`.
/// Returns (block, body) where neither includes the fence lines.
fn locate_block(text: &str) -> Option<(&str, &str)> {
    let mut lines = text.split_inclusive('\n');
    let opening = lines.next()?;
    if opening.trim_end() != FENCE {
        return None;
    }

    let block_start = opening.len();
    let mut offset = block_start;
    for line in lines {
        let trimmed = line.trim_end();
        if trimmed == FENCE || trimmed == YAML_END {
            let body_start = offset + line.len();
            return Some((&text[block_start..offset], &text[body_start..]));
        }
        offset += line.len();
    }

    None
}

/// Parse the fenced block as a YAML mapping
fn parse_block(block: &str) -> Option<IndexMap<String, String>> {
    if block.trim().is_empty() {
        return Some(IndexMap::new());
    }

    let value: Value = match serde_yaml::from_str(block) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Failed to parse YAML front-matter, treating as content: {}", e);
            return None;
        }
    };

    let Value::Mapping(mapping) = value else {
        tracing::debug!("Front-matter block is not a mapping, treating as content");
        return None;
    };

    let mut data = IndexMap::with_capacity(mapping.len());
    for (key, value) in mapping {
        let Some(key) = scalar_to_string(&key) else {
            tracing::debug!("Skipping front-matter entry with non-scalar key");
            continue;
        };
        match value_to_string(&value) {
            Some(value) => {
                data.insert(key, value);
            }
            None => tracing::debug!("Skipping nested front-matter value for `{}`", key),
        }
    }

    Some(data)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => Some(String::new()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// Scalars as-is, flat lists joined with ", "
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Sequence(items) => {
            let parts: Option<Vec<String>> = items.iter().map(scalar_to_string).collect();
            parts.map(|parts| parts.join(", "))
        }
        other => scalar_to_string(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_yaml_frontmatter() {
        let raw = r#"---
title: "Hello"
excerpt: E
date: 2024-01-01
author: A
---
# Hi

there
"#;

        let matter = FrontMatter::split(raw);
        assert_eq!(matter.data.get("title").map(String::as_str), Some("Hello"));
        assert_eq!(matter.data.get("excerpt").map(String::as_str), Some("E"));
        assert_eq!(
            matter.data.get("date").map(String::as_str),
            Some("2024-01-01")
        );
        assert_eq!(matter.data.get("author").map(String::as_str), Some("A"));
        assert_eq!(matter.content, "# Hi\n\nthere\n");
    }

    #[test]
    fn test_keys_keep_file_order() {
        let raw = "---\nzeta: 1\nalpha: 2\nmid: 3\n---\nbody";
        let matter = FrontMatter::split(raw);
        let keys: Vec<_> = matter.data.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_no_frontmatter_returns_whole_input() {
        let raw = "# Just a heading\n\nSome text.";
        let matter = FrontMatter::split(raw);
        assert!(matter.is_empty());
        assert_eq!(matter.content, raw);
    }

    #[test]
    fn test_missing_closing_fence() {
        let raw = "---\ntitle: Broken\n\nNo closing fence here.";
        let matter = FrontMatter::split(raw);
        assert!(matter.is_empty());
        assert_eq!(matter.content, raw);
    }

    #[test]
    fn test_invalid_yaml_is_not_an_error() {
        let raw = "---\ntitle: [unclosed\n---\nbody";
        let matter = FrontMatter::split(raw);
        assert!(matter.is_empty());
        assert_eq!(matter.content, raw);
    }

    #[test]
    fn test_markdown_separator_not_yaml() {
        // Thematic breaks around prose must not be mistaken for front-matter
        let raw = "---\nSome random text with no keys.\n---\nMore content here.";
        let matter = FrontMatter::split(raw);
        assert!(matter.is_empty());
        assert_eq!(matter.content, raw);
    }

    #[test]
    fn test_leading_blank_line_means_no_frontmatter() {
        let raw = "\n---\ntitle: Late\n---\nbody";
        let matter = FrontMatter::split(raw);
        assert!(matter.is_empty());
        assert_eq!(matter.content, raw);
    }

    #[test]
    fn test_empty_block() {
        let matter = FrontMatter::split("---\n---\nbody");
        assert!(matter.is_empty());
        assert_eq!(matter.content, "body");
    }

    #[test]
    fn test_scalars_and_lists_become_strings() {
        let raw = r#"---
draft: true
views: 42
tags:
  - rust
  - blog
nested:
  key: value
empty:
---
"#;
        let matter = FrontMatter::split(raw);
        assert_eq!(matter.data.get("draft").map(String::as_str), Some("true"));
        assert_eq!(matter.data.get("views").map(String::as_str), Some("42"));
        assert_eq!(
            matter.data.get("tags").map(String::as_str),
            Some("rust, blog")
        );
        assert_eq!(matter.data.get("empty").map(String::as_str), Some(""));
        assert!(!matter.data.contains_key("nested"));
        assert_eq!(matter.content, "");
    }

    #[test]
    fn test_bom_and_crlf() {
        let raw = "\u{feff}---\r\ntitle: Windows\r\n---\r\nbody\r\n";
        let matter = FrontMatter::split(raw);
        assert_eq!(
            matter.data.get("title").map(String::as_str),
            Some("Windows")
        );
        assert_eq!(matter.content, "body\r\n");
    }

    #[test]
    fn test_yaml_document_end_marker() {
        let raw = "---\ntitle: Dots\n...\nbody";
        let matter = FrontMatter::split(raw);
        assert_eq!(matter.data.get("title").map(String::as_str), Some("Dots"));
        assert_eq!(matter.content, "body");
    }
}
