mod cache;
mod fetch;

use quantfetch_core::{DataIngestion, Fetched, IngestConfig, IngestError, Origin, ValidationStatus};
use serde::Serialize;
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// One failed item of a command (a symbol in a batch).
#[derive(Debug, Serialize)]
pub struct ErrorEntry {
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

impl ErrorEntry {
    pub fn from_ingest(symbol: Option<String>, error: &IngestError) -> Self {
        Self {
            code: error.code(),
            symbol,
            message: error.to_string(),
            attempts: error.attempts(),
        }
    }
}

pub struct CommandResult {
    pub data: Value,
    pub meta: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<ErrorEntry>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            meta: Value::Object(serde_json::Map::new()),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Data plus provenance of a pipeline fetch.
    pub fn from_fetched<T: Serialize>(fetched: Fetched<T>) -> Result<Self, CliError> {
        let meta = fetch_meta(&fetched);
        Ok(Self {
            data: serde_json::to_value(&fetched.data)?,
            meta,
            warnings: fetched.warnings,
            errors: Vec::new(),
        })
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_errors(mut self, errors: Vec<ErrorEntry>) -> Self {
        self.errors.extend(errors);
        self
    }
}

pub fn fetch_meta<T>(fetched: &Fetched<T>) -> Value {
    let (cache_hit, fetched_at) = match fetched.origin {
        Origin::Cache { fetched_at } => (true, fetched_at.format(&Rfc3339).ok()),
        Origin::Upstream => (false, None),
    };
    let validation = match &fetched.validation {
        ValidationStatus::Passed => json!({ "status": "passed" }),
        ValidationStatus::Skipped => json!({ "status": "skipped" }),
        ValidationStatus::Failed(report) => json!({ "status": "failed", "report": report }),
    };

    json!({
        "cache_key": fetched.cache_key,
        "cache_hit": cache_hit,
        "cached_at": fetched_at,
        "attempts": fetched.attempts,
        "validation": validation,
    })
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    let mut config = IngestConfig::from_env()?;
    if let Some(cache_dir) = &cli.cache_dir {
        config.cache_dir = cache_dir.clone();
    }
    if cli.allow_partial {
        config.allow_partial_data = true;
    }

    let ingestion = DataIngestion::open(config)?;
    let use_cache = !cli.no_cache;
    debug!(
        cache_dir = %ingestion.config().cache_dir.display(),
        use_cache,
        cache_available = ingestion.cache_manager().is_some(),
        "running command"
    );

    let result = match &cli.command {
        Command::History(args) => fetch::history(&ingestion, args, use_cache).await?,
        Command::Multi(args) => fetch::multi(&ingestion, args).await?,
        Command::Quote(args) => fetch::quote(&ingestion, args).await?,
        Command::Info(args) => fetch::info(&ingestion, args, use_cache).await?,
        Command::Options(args) => fetch::options(&ingestion, args, use_cache).await?,
        Command::Expirations(args) => fetch::expirations(&ingestion, args).await?,
        Command::Yields(args) => fetch::yields(&ingestion, args, use_cache).await?,
        Command::Curve(args) => fetch::curve(&ingestion, args, use_cache).await?,
        Command::Cache(args) => cache::run(&ingestion, &args.command).await?,
    };

    Ok(result.with_warnings(ingestion.startup_warnings().to_vec()))
}
