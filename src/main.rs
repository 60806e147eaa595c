use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "retrostamp")]
#[command(about = "Reconstruct missing version tags from the manifest's commit history")]
struct Cli {
    /// Repository to scan
    #[arg(default_value = ".")]
    repo: PathBuf,

    /// History starting point
    #[arg(long, short, default_value = "origin/master")]
    branch: String,

    /// Explicit manifest path (skips discovery)
    #[arg(long, short)]
    manifest: Option<PathBuf>,

    /// Create the missing tags instead of only reporting them
    #[arg(long)]
    apply: bool,

    /// Pass git's own diagnostic output through instead of discarding it
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    retrostamp::run(retrostamp::RunOptions {
        repo: cli.repo,
        branch: cli.branch,
        manifest: cli.manifest,
        apply: cli.apply,
        verbose: cli.verbose,
    })
    .await?;

    Ok(())
}
