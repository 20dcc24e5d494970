use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use fwstate::schema::ListStrategy;

#[derive(Parser, Debug)]
#[command(name = "fwstate")]
#[command(about = "Reconcile declared firewall resources against device state")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    /// Only log errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// List the resource schemas built into the binary.
    Schemas,
    /// Normalize an observed XML document and print it as JSON.
    Normalize(NormalizeArgs),
    /// Decide what would change without submitting anything.
    Plan(PlanArgs),
    /// Reconcile a resource in the file store.
    Apply(ApplyArgs),
}

/// Where the resource schema comes from.
#[derive(clap::Args, Debug)]
pub struct SchemaArgs {
    /// Built-in (or `--schemas-dir`) resource schema name.
    #[arg(long, required_unless_present = "schema", conflicts_with = "schema")]
    pub resource: Option<String>,
    /// Schema TOML file.
    #[arg(long)]
    pub schema: Option<PathBuf>,
    /// Directory searched for `<resource>.toml` before the built-in schemas.
    #[arg(long)]
    pub schemas_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct NormalizeArgs {
    /// Bare object element or management API response envelope.
    pub file: PathBuf,
    #[command(flatten)]
    pub schema: SchemaArgs,
}

#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// Declared state TOML file.
    #[arg(long)]
    pub declared: PathBuf,
    /// Directory holding one `<key>.xml` document per resource.
    #[arg(long)]
    pub store: PathBuf,
    /// Resource key (the entry name).
    #[arg(long)]
    pub key: String,
    #[command(flatten)]
    pub schema: SchemaArgs,
    /// Strategy for every list field, overriding the schema.
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub plan: PlanArgs,
    /// Decide and build, but do not write the store.
    #[arg(long)]
    pub check: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum StrategyArg {
    Add,
    Remove,
    Replace,
}

impl From<StrategyArg> for ListStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Add => ListStrategy::Add,
            StrategyArg::Remove => ListStrategy::Remove,
            StrategyArg::Replace => ListStrategy::Replace,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}
