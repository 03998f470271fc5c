use std::collections::BTreeMap;

use quantfetch_core::{DataIngestion, Interval, Maturity, OptionSide};
use serde_json::{json, Value};

use crate::cli::{CurveArgs, HistoryArgs, MultiArgs, OptionsArgs, QuoteArgs, SymbolArg, YieldsArgs};
use crate::error::CliError;

use super::{fetch_meta, CommandResult, ErrorEntry};

pub async fn history(
    ingestion: &DataIngestion,
    args: &HistoryArgs,
    use_cache: bool,
) -> Result<CommandResult, CliError> {
    let interval = args.interval.parse::<Interval>()?;
    let fetched = ingestion
        .equity()
        .fetch_historical(
            &args.symbol,
            args.start.as_str(),
            args.end.as_str(),
            interval,
            use_cache,
        )
        .await?;
    CommandResult::from_fetched(fetched)
}

pub async fn multi(ingestion: &DataIngestion, args: &MultiArgs) -> Result<CommandResult, CliError> {
    let interval = args.interval.parse::<Interval>()?;
    let outcome = ingestion
        .equity()
        .fetch_multiple(&args.symbols, args.start.as_str(), args.end.as_str(), interval)
        .await?;

    let mut data = BTreeMap::new();
    let mut meta = BTreeMap::new();
    let mut warnings = Vec::new();
    for (symbol, fetched) in outcome.results {
        meta.insert(symbol.clone(), fetch_meta(&fetched));
        warnings.extend(
            fetched
                .warnings
                .iter()
                .map(|warning| format!("{symbol}: {warning}")),
        );
        data.insert(symbol, serde_json::to_value(&fetched.data)?);
    }
    let errors = outcome
        .errors
        .iter()
        .map(|(symbol, error)| ErrorEntry::from_ingest(Some(symbol.clone()), error))
        .collect();

    Ok(CommandResult::ok(serde_json::to_value(data)?)
        .with_meta(serde_json::to_value(meta)?)
        .with_warnings(warnings)
        .with_errors(errors))
}

pub async fn quote(ingestion: &DataIngestion, args: &QuoteArgs) -> Result<CommandResult, CliError> {
    let fetched = ingestion.equity().fetch_realtime_quote(&args.symbol).await?;
    let change = json!({
        "change": fetched.data.change(),
        "change_percent": fetched.data.change_percent(),
    });

    let mut result = CommandResult::from_fetched(fetched)?;
    if let (Value::Object(data), Value::Object(extra)) = (&mut result.data, change) {
        data.extend(extra);
    }
    Ok(result)
}

pub async fn info(
    ingestion: &DataIngestion,
    args: &SymbolArg,
    use_cache: bool,
) -> Result<CommandResult, CliError> {
    let fetched = ingestion.equity().fetch_info(&args.symbol, use_cache).await?;
    CommandResult::from_fetched(fetched)
}

pub async fn options(
    ingestion: &DataIngestion,
    args: &OptionsArgs,
    use_cache: bool,
) -> Result<CommandResult, CliError> {
    let expiration = args.expiration.as_deref();
    match args.side.as_deref() {
        Some(side) => {
            let side = side.parse::<OptionSide>()?;
            let fetched = ingestion
                .options()
                .fetch_side(&args.symbol, expiration, side, use_cache)
                .await?;
            CommandResult::from_fetched(fetched)
        }
        None => {
            let fetched = ingestion
                .options()
                .fetch_option_chain(&args.symbol, expiration, use_cache)
                .await?;
            CommandResult::from_fetched(fetched)
        }
    }
}

pub async fn expirations(
    ingestion: &DataIngestion,
    args: &SymbolArg,
) -> Result<CommandResult, CliError> {
    let fetched = ingestion.options().available_expirations(&args.symbol).await?;
    CommandResult::from_fetched(fetched)
}

pub async fn yields(
    ingestion: &DataIngestion,
    args: &YieldsArgs,
    use_cache: bool,
) -> Result<CommandResult, CliError> {
    let maturities = args
        .maturities
        .iter()
        .map(|raw| raw.parse::<Maturity>())
        .collect::<Result<Vec<_>, _>>()?;
    let fetched = ingestion
        .fixed_income()
        .fetch_treasury_yields(
            &maturities,
            args.start.as_deref(),
            args.end.as_deref(),
            use_cache,
        )
        .await?;
    CommandResult::from_fetched(fetched)
}

pub async fn curve(
    ingestion: &DataIngestion,
    args: &CurveArgs,
    use_cache: bool,
) -> Result<CommandResult, CliError> {
    let fetched = ingestion
        .fixed_income()
        .fetch_yield_curve(args.date.as_deref(), use_cache)
        .await?;
    CommandResult::from_fetched(fetched)
}
