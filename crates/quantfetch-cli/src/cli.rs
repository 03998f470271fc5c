//! CLI argument definitions for quantfetch.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `history` | Historical OHLCV bars for one symbol |
//! | `multi` | Historical bars for several symbols, failures reported per symbol |
//! | `quote` | Latest quote |
//! | `info` | Company profile (name, sector, industry, market cap) |
//! | `options` | Option chain (calls and puts, or one side) |
//! | `expirations` | Listed option expirations |
//! | `yields` | Treasury yield series |
//! | `curve` | Treasury yield curve on one date |
//! | `cache` | Cache summary, sweeps and invalidation |
//!
//! # Examples
//!
//! ```bash
//! quantfetch history AAPL --start 2023-01-01 --end 2023-12-31 --pretty
//! quantfetch multi AAPL MSFT GOOGL --start 2024-01-02 --end 2024-02-01
//! quantfetch options SPY --expiration 2024-01-19 --side put
//! quantfetch yields --maturity 2Y --maturity 10Y
//! quantfetch cache invalidate --table equity --confirm
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Quant-finance market data with rate limiting, retries, validation and a
/// persistent cache.
#[derive(Debug, Parser)]
#[command(name = "quantfetch", author, version, about = "Market data ingestion CLI")]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Log filter used when `RUST_LOG` is unset (e.g. `debug`, `quantfetch_core=trace`).
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Log line layout on stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Skip cache reads; fresh results still overwrite stored ones.
    #[arg(long, global = true, default_value_t = false)]
    pub no_cache: bool,

    /// Cache directory (overrides `QUANT_FINANCE_HOME`).
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Return data that fails validation, with a warning, instead of failing.
    #[arg(long, global = true, default_value_t = false)]
    pub allow_partial: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Compact,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch historical OHLCV bars.
    ///
    /// # Examples
    ///
    ///   quantfetch history AAPL --start 2023-01-01 --end 2023-12-31
    ///   quantfetch history MSFT --start 2024-03-01 --end 2024-03-02 --interval 5m
    History(HistoryArgs),

    /// Fetch historical bars for several symbols concurrently.
    Multi(MultiArgs),

    /// Fetch the latest quote (never cached).
    Quote(QuoteArgs),

    /// Fetch the company profile for a ticker.
    Info(SymbolArg),

    /// Fetch an option chain.
    Options(OptionsArgs),

    /// List option expirations.
    Expirations(SymbolArg),

    /// Fetch treasury yields.
    Yields(YieldsArgs),

    /// Build the treasury yield curve on one date.
    Curve(CurveArgs),

    /// Cache management commands.
    Cache(CacheArgs),
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    pub symbol: String,

    /// First date (`YYYY-MM-DD`), inclusive.
    #[arg(long)]
    pub start: String,

    /// Last date (`YYYY-MM-DD`), exclusive.
    #[arg(long)]
    pub end: String,

    /// Bar interval: 1m 2m 5m 15m 30m 60m 90m 1h 1d 5d 1wk 1mo 3mo.
    #[arg(long, default_value = "1d")]
    pub interval: String,
}

#[derive(Debug, Args)]
pub struct MultiArgs {
    #[arg(required = true, num_args = 1..)]
    pub symbols: Vec<String>,

    #[arg(long)]
    pub start: String,

    #[arg(long)]
    pub end: String,

    #[arg(long, default_value = "1d")]
    pub interval: String,
}

#[derive(Debug, Args)]
pub struct QuoteArgs {
    pub symbol: String,
}

#[derive(Debug, Args)]
pub struct SymbolArg {
    pub symbol: String,
}

#[derive(Debug, Args)]
pub struct OptionsArgs {
    pub symbol: String,

    /// Expiration (`YYYY-MM-DD`); the nearest one when omitted.
    #[arg(long)]
    pub expiration: Option<String>,

    /// Only `call` or `put`.
    #[arg(long)]
    pub side: Option<String>,
}

#[derive(Debug, Args)]
pub struct YieldsArgs {
    /// Maturity (3M 6M 1Y 2Y 5Y 10Y 30Y); repeatable. Defaults to 10Y and 30Y.
    #[arg(long = "maturity")]
    pub maturities: Vec<String>,

    /// Defaults to one year before `--end`.
    #[arg(long)]
    pub start: Option<String>,

    /// Defaults to today.
    #[arg(long)]
    pub end: Option<String>,
}

#[derive(Debug, Args)]
pub struct CurveArgs {
    /// Curve date (`YYYY-MM-DD`); today when omitted.
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Debug, Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Entry counts and size per table.
    Summary,

    /// Remove every expired entry.
    Cleanup,

    /// Remove expired entries only when they make up a large share.
    AutoCleanup(AutoCleanupArgs),

    /// Remove one table or the whole cache. Requires `--confirm`.
    Invalidate(InvalidateArgs),
}

#[derive(Debug, Args)]
pub struct AutoCleanupArgs {
    /// Sweep when the expired share exceeds this ratio.
    #[arg(long, default_value_t = 0.2)]
    pub max_ratio: f64,

    /// ...and at least this many entries are expired.
    #[arg(long, default_value_t = 10)]
    pub min_expired: u64,
}

#[derive(Debug, Args)]
pub struct InvalidateArgs {
    /// `equity`, `options` or `fixed_income`; every table when omitted.
    #[arg(long)]
    pub table: Option<String>,

    /// Actually delete. Without it nothing is removed.
    #[arg(long, default_value_t = false)]
    pub confirm: bool,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn yields_accepts_repeated_maturities() {
        let cli = Cli::parse_from([
            "quantfetch",
            "yields",
            "--maturity",
            "2Y",
            "--maturity",
            "10Y",
        ]);
        let Command::Yields(args) = cli.command else {
            panic!("expected yields command");
        };
        assert_eq!(args.maturities, vec!["2Y", "10Y"]);
        assert!(args.start.is_none());
    }

    #[test]
    fn info_honours_the_global_no_cache_flag() {
        let cli = Cli::parse_from(["quantfetch", "info", "msft", "--no-cache"]);
        assert!(cli.no_cache);
        let Command::Info(args) = cli.command else {
            panic!("expected info command");
        };
        assert_eq!(args.symbol, "msft");
    }

    #[test]
    fn invalidate_defaults_to_unconfirmed() {
        let cli = Cli::parse_from(["quantfetch", "cache", "invalidate", "--table", "equity"]);
        let Command::Cache(CacheArgs {
            command: CacheCommand::Invalidate(args),
        }) = cli.command
        else {
            panic!("expected cache invalidate");
        };
        assert!(!args.confirm);
        assert_eq!(args.table.as_deref(), Some("equity"));
    }
}
