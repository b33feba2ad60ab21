use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    let cli = bookpager::cli::Cli::parse();
    bookpager::logging::init(cli.verbose).context("init logging")?;
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        bookpager::cli::Command::Paginate(args) => {
            bookpager::paginate::run(args).context("paginate")?;
        }
        bookpager::cli::Command::Chapters(args) => {
            bookpager::chapters::run(args).context("chapters")?;
        }
        bookpager::cli::Command::Progress(args) => {
            bookpager::progress::run(args).await.context("progress")?;
        }
    }

    Ok(())
}
