//! Content module - front-matter, the markdown pipeline and the post repository

mod frontmatter;
mod highlight;
pub mod pipeline;
mod post;
mod repository;
pub mod stages;

pub use frontmatter::FrontMatter;
pub use highlight::Highlighter;
pub use pipeline::{ConvertError, Document, Phase, Pipeline, PipelineBuilder, Stage};
pub use post::{parse_date, parse_date_time, sort_newest_first, PostContent, PostMeta};
pub use repository::{PostError, PostRepository, POST_EXTENSION};
