//! Purpose: Internal JSON decoding boundary shared by the codec and the CLI.
//! Exports: `parse` module with decode helpers and failure categories.
//! Role: Single seam for input decoding so callsites avoid ad hoc serde_json calls.
//! Invariants: Every decode failure maps to `ErrorKind::Decode` with a category hint.
//! Invariants: Helper APIs stay small and deterministic (no hidden global state).

pub(crate) mod parse;
