//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;
use std::time::Duration;

use celestrak_client::{ClientConfig, Endpoint, Format, Query, TableFlags};
use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use url::Url;

use crate::error::CliError;

/// Fetch GP orbital element sets from CelesTrak.
#[derive(Debug, Parser)]
#[command(
    name = "celestrak",
    author,
    version,
    about,
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Increase verbosity level (-v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to a TOML client configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "CELESTRAK_CONFIG",
        value_hint = ValueHint::FilePath
    )]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub client: ClientArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Overrides applied on top of the loaded client configuration.
#[derive(Debug, Default, Args)]
pub struct ClientArgs {
    /// Server origin (default https://celestrak.org)
    #[arg(long, global = true, value_hint = ValueHint::Url)]
    pub base_url: Option<Url>,

    /// User-Agent header sent with each request
    #[arg(long, global = true)]
    pub user_agent: Option<String>,

    /// Retries after the first attempt
    #[arg(long, global = true)]
    pub retries: Option<u32>,

    /// Wait before the first retry, in milliseconds; doubles per retry
    #[arg(long, global = true)]
    pub retry_delay_ms: Option<u64>,

    /// Give up on the whole fetch after this many seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Write the payload to a file instead of stdout
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

impl ClientArgs {
    /// Apply the flags that were given to `config`.
    pub fn apply(&self, mut config: ClientConfig) -> Result<ClientConfig, CliError> {
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(user_agent) = &self.user_agent {
            let user_agent = user_agent.trim();
            config.user_agent = (!user_agent.is_empty()).then(|| user_agent.to_string());
        }
        if let Some(retries) = self.retries {
            config.max_retries = retries;
        }
        if let Some(delay) = self.retry_delay_ms {
            config.retry_delay = Duration::from_millis(delay);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Current element sets (gp.php)
    Gp(SelectArgs),

    /// Earliest element set on record (gp-first.php)
    First(SelectArgs),

    /// Latest element set on record (gp-last.php)
    Last(SelectArgs),

    /// Tabular listing (table.php)
    Table(TableArgs),
}

impl Command {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Self::Gp(_) => Endpoint::Current,
            Self::First(_) => Endpoint::First,
            Self::Last(_) => Endpoint::Last,
            Self::Table(_) => Endpoint::Table,
        }
    }

    pub fn query(&self) -> Query {
        match self {
            Self::Gp(select) | Self::First(select) | Self::Last(select) => select.query(),
            Self::Table(table) => table.select.query().with_table_flags(table.flags()),
        }
    }
}

/// Object selection. Exactly one selector must be given.
#[derive(Debug, Default, Args)]
pub struct SelectArgs {
    /// NORAD catalog number
    #[arg(long)]
    pub catnr: Option<String>,

    /// International designator, e.g. 1998-067A
    #[arg(long)]
    pub intdes: Option<String>,

    /// Named group, e.g. stations
    #[arg(long)]
    pub group: Option<String>,

    /// Object name substring
    #[arg(long)]
    pub name: Option<String>,

    /// Special dataset: GPZ, GPZ-PLUS, DECAYING
    #[arg(long)]
    pub special: Option<String>,

    /// Output format: TLE, 3LE, 2LE, XML, KVN, JSON, JSON-PRETTY, CSV
    #[arg(short, long, default_value_t = Format::Tle)]
    pub format: Format,
}

impl SelectArgs {
    pub fn query(&self) -> Query {
        Query {
            catnr: self.catnr.clone().unwrap_or_default(),
            intdes: self.intdes.clone().unwrap_or_default(),
            group: self.group.clone().unwrap_or_default(),
            name: self.name.clone().unwrap_or_default(),
            special: self.special.clone().unwrap_or_default(),
            ..Query::default()
        }
        .with_format(self.format)
    }
}

#[derive(Debug, Default, Args)]
pub struct TableArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Show BSTAR instead of eccentricity
    #[arg(long)]
    pub bstar: bool,

    /// Show the operational status column
    #[arg(long)]
    pub show_ops: bool,

    /// Only objects whose data is older than 3.5 days
    #[arg(long)]
    pub oldest: bool,

    /// Only docked objects
    #[arg(long)]
    pub docked: bool,

    /// Only GEO objects drifting more than 0.1 deg per day
    #[arg(long)]
    pub movers: bool,
}

impl TableArgs {
    pub fn flags(&self) -> TableFlags {
        TableFlags {
            bstar: self.bstar,
            show_ops: self.show_ops,
            oldest: self.oldest,
            docked: self.docked,
            movers: self.movers,
        }
    }
}
