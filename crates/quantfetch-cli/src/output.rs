use std::io::{self, Write};

use serde::Serialize;
use serde_json::Value;

use crate::commands::{CommandResult, ErrorEntry};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct Document<'a> {
    data: &'a Value,
    meta: &'a Value,
    warnings: &'a [String],
    errors: &'a [ErrorEntry],
}

/// Write the result document as one JSON value on stdout.
pub fn render(result: &CommandResult, pretty: bool) -> Result<(), CliError> {
    let document = Document {
        data: &result.data,
        meta: &result.meta,
        warnings: &result.warnings,
        errors: &result.errors,
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if pretty {
        serde_json::to_writer_pretty(&mut handle, &document)?;
    } else {
        serde_json::to_writer(&mut handle, &document)?;
    }
    writeln!(handle)?;
    Ok(())
}
