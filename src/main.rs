//! CLI entry point for inkpost

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "inkpost")]
#[command(author = "Yukang Chen")]
#[command(version)]
#[command(about = "A small markdown blog engine", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new blog
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        folder: PathBuf,
    },

    /// Create a new post
    New {
        /// Title of the new post
        title: String,

        /// Author, defaults to the site author
        #[arg(short, long)]
        author: Option<String>,

        /// Short summary shown in listings
        #[arg(short, long)]
        excerpt: Option<String>,
    },

    /// List posts, newest first
    List {
        /// Print metadata as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render a single post
    Show {
        /// Slug of the post (its file name without `.md`)
        slug: String,

        /// Print metadata and html as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate static files
    #[command(alias = "g")]
    Generate {
        /// Watch for file changes
        #[arg(short, long)]
        watch: bool,
    },

    /// Remove the public folder
    Clean,

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "inkpost=debug,info"
    } else {
        "inkpost=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Determine base directory
    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Init { folder } => {
            let target_dir = if folder.is_absolute() {
                folder
            } else {
                base_dir.join(folder)
            };
            tracing::info!("Initializing blog in {:?}", target_dir);
            inkpost::commands::init::init_site(&target_dir)?;
            println!("Initialized blog in {:?}", target_dir);
        }

        Commands::New {
            title,
            author,
            excerpt,
        } => {
            let blog = inkpost::Blog::new(&base_dir)?;
            tracing::info!("Creating new post with title: {}", title);
            let path = inkpost::commands::new::create_post(
                &blog,
                &title,
                author.as_deref(),
                excerpt.as_deref(),
            )?;
            println!("Created: {:?}", path);
        }

        Commands::List { json } => {
            let blog = inkpost::Blog::new(&base_dir)?;
            inkpost::commands::list::run(&blog, json).await?;
        }

        Commands::Show { slug, json } => {
            let blog = inkpost::Blog::new(&base_dir)?;
            inkpost::commands::show::run(&blog, &slug, json).await?;
        }

        Commands::Generate { watch } => {
            let blog = inkpost::Blog::new(&base_dir)?;
            tracing::info!("Generating static files...");

            blog.generate().await?;
            println!("Generated successfully!");

            if watch {
                tracing::info!("Watching for file changes...");
                inkpost::commands::generate::watch(&blog).await?;
            }
        }

        Commands::Clean => {
            let blog = inkpost::Blog::new(&base_dir)?;
            tracing::info!("Cleaning public folder...");
            blog.clean()?;
            println!("Cleaned successfully!");
        }

        Commands::Version => {
            println!("inkpost version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
