//! Generate static files

use anyhow::Result;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Sender};
use std::time::Duration;

use crate::generator::{GenerateReport, Generator};
use crate::Blog;

/// Generate the static site
pub async fn run(blog: &Blog) -> Result<()> {
    let start = std::time::Instant::now();

    let generator = Generator::new(blog)?;
    let GenerateReport { posts, assets } = generator.generate().await?;

    tracing::info!(
        "Generated {} posts and {} assets in {:.2}s",
        posts,
        assets,
        start.elapsed().as_secs_f64()
    );

    Ok(())
}

/// Watch posts, static files and config, regenerating on change
pub async fn watch(blog: &Blog) -> Result<()> {
    let (tx, rx) = channel();
    let mut blog = blog.clone();
    let mut watcher = watch_blog(&blog, tx.clone())?;

    tracing::info!("Watching for changes. Press Ctrl+C to stop.");

    let mut last_rebuild = std::time::Instant::now();

    loop {
        // The receiver blocks, so wait for it off the async workers
        let rx_ref = &rx;
        let received =
            tokio::task::block_in_place(|| rx_ref.recv_timeout(Duration::from_millis(100)));

        match received {
            Ok(event) => {
                if is_output_event(&event, &blog.public_dir) {
                    continue;
                }

                // Debounce: only rebuild if more than 500ms since last rebuild
                if last_rebuild.elapsed() > Duration::from_millis(500) {
                    tracing::info!("File changed, regenerating...");
                    // Config may have changed too
                    match Blog::new(&blog.base_dir) {
                        Ok(current) => {
                            if let Err(e) = run(&current).await {
                                tracing::error!("Generation failed: {:#}", e);
                            }
                            // Directories may have moved or been created
                            watcher = watch_blog(&current, tx.clone())?;
                            blog = current;
                        }
                        Err(e) => tracing::error!("Failed to reload config: {:#}", e),
                    }
                    last_rebuild = std::time::Instant::now();
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    drop(watcher);
    Ok(())
}

/// A watcher over every directory of `blog` that exists right now
fn watch_blog(blog: &Blog, tx: Sender<Event>) -> Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res| {
        if let Ok(event) = res {
            let _ = tx.send(event);
        }
    })?;

    for (path, mode) in watch_targets(blog) {
        if path.exists() {
            watcher.watch(&path, mode)?;
            tracing::debug!("Watching {:?}", path);
        }
    }

    Ok(watcher)
}

/// The base directory is watched on its own so that `_config.yml` edits
/// and a posts directory created later are both noticed
fn watch_targets(blog: &Blog) -> Vec<(PathBuf, RecursiveMode)> {
    vec![
        (blog.base_dir.clone(), RecursiveMode::NonRecursive),
        (blog.posts_dir.clone(), RecursiveMode::NonRecursive),
        (blog.static_dir.clone(), RecursiveMode::Recursive),
    ]
}

/// Events caused by writing the output itself
fn is_output_event(event: &Event, public_dir: &Path) -> bool {
    !event.paths.is_empty() && event.paths.iter().all(|p| p.starts_with(public_dir))
}
