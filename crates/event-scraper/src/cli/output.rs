//! Result emission: one JSON line on stdout for a record, one on stderr for
//! an error.

use std::io::Write;

use serde::Serialize;

use crate::pipeline::Outcome;

/// Serialize `value` as a single compact JSON line. Non-ASCII text is
/// written literally.
pub fn json_line<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(value)
}

/// Write the outcome to the stream it belongs on.
pub fn emit_to<O: Write, E: Write>(
    outcome: &Outcome,
    out: &mut O,
    err: &mut E,
) -> anyhow::Result<()> {
    match outcome {
        Outcome::Success(record) => {
            writeln!(out, "{}", json_line(record)?)?;
            out.flush()?;
        }
        Outcome::Failure(error) => {
            writeln!(err, "{}", json_line(error)?)?;
            err.flush()?;
        }
    }
    Ok(())
}

/// Write the outcome to the process's stdout/stderr.
pub fn emit(outcome: &Outcome) -> anyhow::Result<()> {
    emit_to(outcome, &mut std::io::stdout().lock(), &mut std::io::stderr().lock())
}
