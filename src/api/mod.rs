//! Purpose: Define the public Rust API boundary for json2ssm.
//! Exports: Codec entrypoints, the parameter store seam, the SSM backend, and the batch executor.
//! Role: Public surface used by the CLI and integration tests; hides internal modules.
//! Invariants: This module is the only public path to core types.
//! Invariants: Internal modules (`json`) remain private and are not directly exposed.

mod batch;
mod ssm;
mod store;

pub use crate::core::codec::{FlatMap, MAX_ARRAY_INDEX, flatten, flatten_reader, unflatten};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::scalar::{CoerceError, Scalar, TYPE_TAG_KEY};
pub use batch::{
    BatchExecutor, BatchOptions, BatchReport, BatchSummary, DEFAULT_BATCH_PAUSE,
    DEFAULT_BATCH_SIZE, KeyOutcome, KeyStatus, Pacing, Progress,
};
pub use ssm::{SsmConfig, SsmStore};
pub use store::{ApiResult, Parameter, ParameterPage, ParameterStore, Tag};
