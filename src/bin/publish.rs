//! Manual publisher: commit one article JSON, list or delete published articles.

use std::io::Read as _;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::Parser;
use serde_json::json;

use tech_pulse_pipeline::{
    article::{Candidate, Category},
    config::Settings,
    publish::{document, Article, DryRunPublisher, GitHubRepo, Publisher, RepoPublisher},
};

#[derive(Parser, Debug)]
#[command(
    name = "tech-pulse-publish",
    version,
    about = "Publish a Tech Pulse article to the content repository"
)]
struct Args {
    /// Article JSON file
    #[arg(conflicts_with_all = ["stdin", "list", "delete"])]
    file: Option<PathBuf>,

    /// Read the article JSON from standard input
    #[arg(long, conflicts_with_all = ["list", "delete"])]
    stdin: bool,

    /// List published articles across all categories
    #[arg(long, conflicts_with = "delete")]
    list: bool,

    /// Delete a published article
    #[arg(long, num_args = 2, value_names = ["CATEGORY", "ID"])]
    delete: Option<Vec<String>>,

    /// Print the rendered document instead of committing it
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    let settings = Settings::from_env();
    tech_pulse_pipeline::init_tracing(settings.json_logs);

    match run(args, &settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", json!({ "success": false, "message": format!("{e:#}") }));
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args, settings: &Settings) -> Result<()> {
    if args.list {
        let publisher = RepoPublisher::new(GitHubRepo::new(&settings.github)?);
        for path in publisher.list().await? {
            println!("{path}");
        }
        return Ok(());
    }

    if let Some(parts) = args.delete.as_deref() {
        let [category, id] = parts else {
            return Err(anyhow!("usage: --delete <category> <id>"));
        };
        let category = Category::ALL
            .into_iter()
            .find(|c| c.as_str() == category.as_str())
            .ok_or_else(|| anyhow!("unknown category '{category}'"))?;
        let publisher = RepoPublisher::new(GitHubRepo::new(&settings.github)?);
        let message = publisher.delete(category, id).await?;
        println!("{}", json!({ "success": true, "message": message }));
        return Ok(());
    }

    let raw = if args.stdin {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading article from stdin")?;
        buf
    } else if let Some(path) = &args.file {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    } else {
        return Err(anyhow!(
            "nothing to do: pass <file>, --stdin, --list or --delete <category> <id>"
        ));
    };

    let candidate: Candidate = serde_json::from_str(&raw).context("parsing article JSON")?;
    let now = Utc::now();
    let article = Article::from_candidate(&candidate, now);

    if args.dry_run {
        print!("{}", document::render(&article.normalized(now))?);
        return Ok(());
    }

    let publisher: Box<dyn Publisher> = if settings.auto_push {
        Box::new(RepoPublisher::new(GitHubRepo::new(&settings.github)?))
    } else {
        Box::new(DryRunPublisher)
    };
    let published = publisher.publish(&article).await?;
    println!(
        "{}",
        json!({
            "success": true,
            "message": published.message,
            "url": published.url,
            "path": published.path,
        })
    );
    Ok(())
}
