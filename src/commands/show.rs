//! Show a single post

use anyhow::Result;

use crate::content::{PostContent, PostError};
use crate::Blog;

/// Print one post's rendered HTML, or the whole post as JSON
pub async fn run(blog: &Blog, slug: &str, json: bool) -> Result<()> {
    let post = fetch(blog, slug).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&post)?);
    } else {
        print!("{}", post.html);
    }

    Ok(())
}

async fn fetch(blog: &Blog, slug: &str) -> Result<PostContent> {
    match blog.repository().get_full(slug).await {
        Ok(post) => Ok(post),
        Err(PostError::NotFound(slug)) => anyhow::bail!("post `{}` not found (404)", slug),
        Err(e) => Err(e.into()),
    }
}
