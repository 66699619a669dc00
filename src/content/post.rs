//! Post models

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Metadata of a post: its slug plus whatever the front-matter declared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMeta {
    /// Identifier derived from the file name
    pub slug: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Short summary shown in listings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,

    /// ISO-8601 date string, kept as written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Any other declared keys, in file order
    #[serde(flatten)]
    pub extra: IndexMap<String, String>,
}

impl PostMeta {
    /// Build metadata from a front-matter block. The file-derived slug
    /// always wins over a declared `slug` key.
    pub fn from_front_matter(slug: &str, mut data: IndexMap<String, String>) -> Self {
        if data.shift_remove("slug").is_some() {
            tracing::debug!("Ignoring declared slug in favour of file name `{}`", slug);
        }

        Self {
            slug: slug.to_string(),
            title: data.shift_remove("title"),
            excerpt: data.shift_remove("excerpt"),
            date: data.shift_remove("date"),
            author: data.shift_remove("author"),
            extra: data,
        }
    }

    /// Title for display, falling back to the slug
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.slug)
    }

    /// The `date` field as a calendar date
    pub fn published_on(&self) -> Option<NaiveDate> {
        self.date.as_deref().and_then(parse_date)
    }
}

/// A post with its body rendered to HTML
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostContent {
    pub meta: PostMeta,
    pub html: String,
}

/// Sort newest first. Undated posts go last; ties are broken by slug.
pub fn sort_newest_first(posts: &mut [PostMeta]) {
    posts.sort_by(|a, b| {
        let by_date = match (a.published_on(), b.published_on()) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_date.then_with(|| a.slug.cmp(&b.slug))
    });
}

/// Parse a date in the ISO-8601 shapes authors actually write
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    parse_date_time(s).map(|dt| dt.date())
}

/// Like [`parse_date`], keeping the time of day. A bare date is midnight.
pub fn parse_date_time(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_time(NaiveTime::MIN));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }

    let formats = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    formats
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}
