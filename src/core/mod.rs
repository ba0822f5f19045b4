//! Purpose: Crate-internal core for the JSON/parameter transform.
//! Exports: `codec` (flatten/unflatten), `scalar` (leaf kinds and type tags), `error`.
//! Role: Pure building blocks shared by the batch executor and the CLI.
//! Invariants: No I/O beyond reading a caller-supplied reader; no remote calls.
pub mod codec;
pub mod error;
pub mod scalar;
