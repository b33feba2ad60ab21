use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Enable debug logging for this crate (`RUST_LOG` takes precedence).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Paginate(PaginateArgs),
    Chapters(ChaptersArgs),
    Progress(ProgressArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Args)]
pub struct PaginateArgs {
    /// Book content file (HTML or plain text; `.md` is rendered as Markdown).
    #[arg(long)]
    pub input: String,

    /// Output file for the pagination result (default: stdout).
    #[arg(long)]
    pub out: Option<String>,

    /// Overwrite `--out` if it exists.
    #[arg(long, default_value_t = false)]
    pub force: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Render the input as Markdown regardless of extension.
    #[arg(long, default_value_t = false)]
    pub markdown: bool,

    /// Reader config YAML file.
    #[arg(long)]
    pub config: Option<String>,

    #[arg(long)]
    pub target_words: Option<usize>,

    #[arg(long)]
    pub min_words: Option<usize>,

    #[arg(long)]
    pub max_words: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ChaptersArgs {
    /// Book content file.
    #[arg(long)]
    pub input: String,

    #[arg(long, default_value_t = false)]
    pub markdown: bool,
}

#[derive(Debug, Args)]
pub struct ProgressArgs {
    /// Book content file.
    #[arg(long)]
    pub input: String,

    /// Current page (1-based).
    #[arg(long)]
    pub page: usize,

    #[arg(long, default_value_t = false)]
    pub markdown: bool,

    /// Reader config YAML file.
    #[arg(long)]
    pub config: Option<String>,

    /// Book id used as the progress record key.
    #[arg(long, requires = "store")]
    pub book_id: Option<String>,

    /// Directory to persist progress under (`<store>/progress/<book-id>.json`).
    #[arg(long, requires = "book_id")]
    pub store: Option<String>,
}
