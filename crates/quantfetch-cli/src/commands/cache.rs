use quantfetch_core::{DataIngestion, Invalidation};
use serde_json::json;

use crate::cli::CacheCommand;
use crate::error::CliError;

use super::CommandResult;

pub async fn run(
    ingestion: &DataIngestion,
    command: &CacheCommand,
) -> Result<CommandResult, CliError> {
    let manager = ingestion.cache_manager().ok_or_else(|| {
        CliError::Command(String::from("the cache is unavailable; see warnings in the log"))
    })?;

    match command {
        CacheCommand::Summary => {
            let summary = manager.summary().await?;
            Ok(CommandResult::ok(serde_json::to_value(summary)?))
        }
        CacheCommand::Cleanup => {
            let removed = manager.cleanup_expired_entries().await?;
            Ok(CommandResult::ok(json!({ "removed": removed })))
        }
        CacheCommand::AutoCleanup(args) => {
            let outcome = manager
                .auto_cleanup_if_needed(args.max_ratio, args.min_expired)
                .await?;
            Ok(CommandResult::ok(serde_json::to_value(outcome)?))
        }
        CacheCommand::Invalidate(args) => {
            let outcome = match args.table.as_deref() {
                Some(table) => manager.invalidate_table(table, args.confirm).await?,
                None => manager.invalidate_all(args.confirm).await?,
            };
            Ok(invalidation_result(outcome))
        }
    }
}

fn invalidation_result(outcome: Invalidation) -> CommandResult {
    let result = CommandResult::ok(json!(outcome));
    match outcome {
        Invalidation::ConfirmationRequired => result.with_warnings(vec![String::from(
            "nothing removed; repeat with --confirm to delete",
        )]),
        Invalidation::Removed(_) => result,
    }
}
