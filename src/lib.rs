//! Purpose: Library crate behind the `json2ssm` CLI and its tests.
//! Exports: `api` (codec, parameter store seam, SSM backend, batch executor, errors).
//! Role: Keeps the JSON/parameter transform and batch orchestration testable without AWS.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
//! Invariants: Only `api` is public; `core` and `json` stay crate-internal.
pub mod api;
mod core;
mod json;
