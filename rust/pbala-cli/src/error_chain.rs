//! Diagnostic printing for the top-level error, in the `error: ...` /
//! `  caused by: ...` style (SPEC_FULL.md §10.2). Adapted from
//! `lumen-cli`'s `ErrorChain` helper, trimmed to what a single top-level
//! `PbalaError` needs: walk `std::error::Error::source()` and print.

use std::fmt::Write as _;

/// Render `err` and its full `source()` chain the way `main` prints a
/// fatal error to stderr before exiting with the mapped code.
pub fn format_error_chain(err: &dyn std::error::Error) -> String {
    let mut out = format!("error: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        let _ = write!(out, "\n  caused by: {cause}");
        source = cause.source();
    }
    out
}
