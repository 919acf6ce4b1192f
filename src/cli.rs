use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::api::DateType;
use crate::formats::DocumentKind;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Home directory holding `config/`, `assets/` and `data/`.
    #[arg(long, global = true, env = crate::config::ENV_HOME, default_value = ".")]
    pub home: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search statutes, rules, ordinances, precedents and decisions.
    Search(SearchArgs),
    /// Statutes named exactly NAME (ignoring spaces), with their decrees.
    Exact(ExactArgs),
    /// Search precedents with court and date filters.
    Cases(CasesArgs),
    /// Fetch one document into the local cache.
    Fetch(FetchArgs),
    /// List recently amended statutes.
    Recent(RecentArgs),
    /// Convert a cached statute XML into Markdown.
    Parse(ParseArgs),
    Index {
        #[command(subcommand)]
        command: IndexCommand,
    },
    /// Report amended major laws and the curated files they affect.
    CheckUpdates(CheckUpdatesArgs),
    /// Check that article citations in curated files still exist.
    ValidateCitations(ValidateCitationsArgs),
    Gateway {
        #[command(subcommand)]
        command: GatewayCommand,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Markdown,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortOrder {
    Date,
    Name,
}

impl SortOrder {
    pub fn as_param(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Name => "name",
        }
    }
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Search terms.
    pub query: String,

    /// Document kind.
    #[arg(long = "type", value_enum, default_value = "law")]
    pub kind: DocumentKind,

    /// Results per page (max 100).
    #[arg(long, default_value_t = 20)]
    pub display: u32,

    #[arg(long, default_value_t = 1)]
    pub page: u32,

    #[arg(long, value_enum)]
    pub sort: Option<SortOrder>,

    #[arg(long, short = 'f', value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct ExactArgs {
    /// Full statute name (e.g. 상법, 개인정보 보호법).
    pub name: String,

    /// Also list administrative rules (notices, directives) issued under it.
    #[arg(long)]
    pub with_admrul: bool,

    #[arg(long, short = 'f', value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct CasesArgs {
    /// Search terms.
    pub query: String,

    /// Keep only courts whose name contains this (e.g. 대법원, 고등).
    #[arg(long)]
    pub court: Option<String>,

    /// Keep only judgments on or after this date (YYYYMMDD).
    #[arg(long = "from")]
    pub from_date: Option<String>,

    #[arg(long, default_value_t = 20)]
    pub display: u32,

    #[arg(long, default_value_t = 1)]
    pub page: u32,

    #[arg(long, short = 'f', value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
#[command(group(
    clap::ArgGroup::new("key")
        .required(true)
        .args(["id", "name", "case"]),
))]
pub struct FetchArgs {
    /// Document identifier (MST for local ordinances).
    #[arg(long)]
    pub id: Option<String>,

    /// Statute name; major laws resolve through the registry.
    #[arg(long)]
    pub name: Option<String>,

    /// Precedent case number (e.g. 2022다12345).
    #[arg(long = "case")]
    pub case: Option<String>,

    /// Document kind for `--id`.
    #[arg(long = "type", value_enum, default_value = "law")]
    pub kind: DocumentKind,

    /// Also fetch the enforcement decree and rule (with `--name`).
    #[arg(long)]
    pub with_decree: bool,

    /// Ignore the cache and download again.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct RecentArgs {
    /// Look back this many days.
    #[arg(long, default_value_t = 30)]
    pub days: u32,

    /// Window start (YYYYMMDD); needs `--to`.
    #[arg(long = "from", requires = "to_date")]
    pub from_date: Option<String>,

    /// Window end (YYYYMMDD).
    #[arg(long = "to", requires = "from_date")]
    pub to_date: Option<String>,

    #[arg(long, value_enum, default_value = "ef")]
    pub date_type: DateType,

    #[arg(long, default_value_t = 100)]
    pub display: u32,

    #[arg(long, short = 'f', value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct ParseArgs {
    /// Statute XML file.
    pub xml: String,

    /// Only this article number (e.g. 750).
    #[arg(long, short = 'a')]
    pub article: Option<String>,

    /// Output path (default: `data/parsed/{name}.md`).
    #[arg(long, short = 'o')]
    pub out: Option<String>,

    /// Print to stdout instead of writing a file.
    #[arg(long, short = 'p', conflicts_with = "out")]
    pub print: bool,
}

#[derive(Debug, Subcommand)]
pub enum IndexCommand {
    /// Rebuild the law → curated files index.
    Build(IndexBuildArgs),
    /// Show the curated files citing a law.
    Lookup(IndexLookupArgs),
}

#[derive(Debug, Args)]
pub struct IndexBuildArgs {
    /// Save the snapshot to `data/law_to_files.json`.
    #[arg(long)]
    pub save: bool,

    #[arg(long, short = 'f', value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct IndexLookupArgs {
    pub law: String,

    #[arg(long, short = 'f', value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct CheckUpdatesArgs {
    /// Look back this many days.
    #[arg(long, conflicts_with = "since")]
    pub days: Option<u32>,

    /// Start date (YYYY-MM-DD).
    #[arg(long)]
    pub since: Option<String>,

    #[arg(long, short = 'f', value_enum, default_value = "text")]
    pub format: ReportFormat,

    /// Record today as the last successful check.
    #[arg(long)]
    pub update_state: bool,
}

#[derive(Debug, Args)]
pub struct ValidateCitationsArgs {
    /// Only citations whose law name contains this.
    #[arg(long)]
    pub law: Option<String>,

    /// Check at most this many citations.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Pause between origin calls.
    #[arg(long, default_value_t = crate::citations::DEFAULT_DELAY_MS)]
    pub delay_ms: u64,

    /// Collect citations without calling the origin.
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, short = 'f', value_enum, default_value = "text")]
    pub format: ReportFormat,
}

#[derive(Debug, Subcommand)]
pub enum GatewayCommand {
    /// Show whether a relay is configured.
    Status,
}
