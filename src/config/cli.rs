use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the pubcache binary.
#[derive(Debug, Parser)]
#[command(
    name = "pubcache",
    version,
    about = "Inspect pubcache settings, policies and cache keys"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "PUBCACHE_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print the resolved settings.
    Settings,
    /// Print the effective cache policy for every entity kind.
    Policies,
    /// Print the published-cache key a query resolves to.
    Keys(KeysArgs),
}

#[derive(Debug, Args, Clone)]
pub struct KeysArgs {
    #[command(subcommand)]
    pub query: KeyQuery,
}

#[derive(Debug, Subcommand, Clone, PartialEq, Eq)]
pub enum KeyQuery {
    /// Root content ids for a culture.
    ContentAtRoot {
        #[arg(long)]
        preview: bool,
        #[arg(long, value_name = "CULTURE")]
        culture: Option<String>,
    },
    /// Content ids of a content type alias.
    ContentByType {
        #[arg(long)]
        preview: bool,
        #[arg(value_name = "ALIAS")]
        alias: String,
    },
    /// Content key lookup by integer id.
    ContentById {
        #[arg(long)]
        preview: bool,
        #[arg(value_name = "ID")]
        id: i32,
    },
    /// Media key lookup by integer id.
    MediaById {
        #[arg(value_name = "ID")]
        id: i32,
    },
    /// Member key lookup by integer id.
    MemberById {
        #[arg(value_name = "ID")]
        id: i32,
    },
    /// All domain ids.
    Domains {
        #[arg(long)]
        include_wildcards: bool,
    },
    /// Domain ids assigned to a document.
    AssignedDomains {
        #[arg(value_name = "DOCUMENT_ID")]
        document_id: i32,
        #[arg(long)]
        include_wildcards: bool,
    },
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the sliding lifetime of repository entries.
    #[arg(long = "cache-entity-ttl-seconds", value_name = "SECONDS", global = true)]
    pub cache_entity_ttl_seconds: Option<u64>,

    /// Override the absolute lifetime of published-cache entries.
    #[arg(long = "cache-published-ttl-seconds", value_name = "SECONDS", global = true)]
    pub cache_published_ttl_seconds: Option<u64>,

    /// Let full data sets expire with the entity lifetime.
    #[arg(
        long = "cache-full-data-set-expires",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub cache_full_data_set_expires: Option<bool>,
}
