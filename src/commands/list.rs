//! List posts

use anyhow::Result;

use crate::content::{sort_newest_first, PostMeta};
use crate::Blog;

/// Print every readable post, newest first
pub async fn run(blog: &Blog, json: bool) -> Result<()> {
    let mut posts = blog.repository().list_all().await?;
    sort_newest_first(&mut posts);

    if json {
        println!("{}", serde_json::to_string_pretty(&posts)?);
    } else {
        print!("{}", format_table(&posts));
    }

    Ok(())
}

fn format_table(posts: &[PostMeta]) -> String {
    let mut out = format!("Posts ({}):\n", posts.len());
    for post in posts {
        out.push_str(&format!(
            "  {:<10} - {} [{}]\n",
            post.date.as_deref().unwrap_or("-"),
            post.display_title(),
            post.slug
        ));
    }
    out
}
