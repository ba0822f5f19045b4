//! Purpose: Apply flat maps to a parameter store with concurrent, paced workers.
//! Exports: `BatchExecutor`, `BatchOptions`, `Pacing`, `BatchReport`, `BatchSummary`,
//! `KeyOutcome`, `KeyStatus`, `Progress`.
//! Role: Orchestrates import, export and delete; the codec does the shape work.
//! Invariants: One worker per key; dispatch follows key order and is paced, not bounded.
//! Invariants: Results come back through the join, indexed by dispatch order, so the
//! first error is the lowest-index failure regardless of completion order.
//! Invariants: Stop-on-error only prevents new calls; running workers are never cancelled.
//! Notes: No retries; transport timeouts are whatever the store backend enforces.
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::task::{JoinError, JoinSet};

use super::store::{ApiResult, Parameter, ParameterStore, Tag};
use crate::core::codec::{FlatMap, PATH_DELIMITER, unflatten};
use crate::core::error::{Error, ErrorKind};
use crate::core::scalar::{Scalar, TYPE_TAG_KEY};

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_secs(10);

const DEFAULT_TYPE_TAG: &str = "string";

/// Dispatch pacing: sleep `pause` after every `batch_size` dispatched workers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Pacing {
    pub batch_size: usize,
    pub pause: Duration,
}

impl Pacing {
    pub fn new(batch_size: usize, pause: Duration) -> Self {
        Self { batch_size, pause }
    }

    pub fn unpaced() -> Self {
        Self::new(0, Duration::ZERO)
    }

    fn pause_before(&self, dispatched: usize) -> Option<Duration> {
        if self.batch_size == 0 || self.pause.is_zero() || dispatched == 0 {
            return None;
        }
        (dispatched % self.batch_size == 0).then_some(self.pause)
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE, DEFAULT_BATCH_PAUSE)
    }
}

#[derive(Clone, Debug, Default)]
pub struct BatchOptions {
    pub pacing: Pacing,
    pub stop_on_error: bool,
    /// Description attached to every parameter written by `import`.
    pub description: Option<String>,
}

#[derive(Debug)]
pub enum KeyStatus {
    Done,
    /// The value was written but a follow-up call (tagging) failed.
    Partial(Error),
    Failed(Error),
    Skipped,
}

impl KeyStatus {
    fn error(&self) -> Option<&Error> {
        match self {
            KeyStatus::Partial(err) | KeyStatus::Failed(err) => Some(err),
            KeyStatus::Done | KeyStatus::Skipped => None,
        }
    }
}

#[derive(Debug)]
pub struct KeyOutcome {
    pub key: String,
    pub status: KeyStatus,
}

/// Progress notification, delivered once per settled worker.
#[derive(Clone, Copy, Debug)]
pub struct Progress<'a> {
    pub completed: usize,
    pub total: usize,
    pub key: &'a str,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped: usize,
}

/// Per-key outcomes in dispatch (key) order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<KeyOutcome>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn attempted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| !matches!(outcome.status, KeyStatus::Skipped))
            .count()
    }

    /// Keys whose primary call (set or delete) succeeded.
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome.status, KeyStatus::Done | KeyStatus::Partial(_)))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.total() - self.attempted()
    }

    pub fn first_error(&self) -> Option<&Error> {
        self.outcomes
            .iter()
            .find_map(|outcome| outcome.status.error())
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            total: self.total(),
            attempted: self.attempted(),
            succeeded: self.succeeded(),
            skipped: self.skipped(),
        }
    }

    /// Returns the summary, or the first error annotated with the success count.
    pub fn into_result(self) -> Result<BatchSummary, Error> {
        let summary = self.summary();
        let first_error = self
            .outcomes
            .into_iter()
            .find_map(|outcome| match outcome.status {
                KeyStatus::Partial(err) | KeyStatus::Failed(err) => Some(err),
                KeyStatus::Done | KeyStatus::Skipped => None,
            });
        match first_error {
            Some(err) => Err(err.with_completed(summary.succeeded as u64)),
            None => Ok(summary),
        }
    }
}

pub struct BatchExecutor {
    store: Arc<dyn ParameterStore>,
    options: BatchOptions,
}

impl BatchExecutor {
    pub fn new(store: Arc<dyn ParameterStore>, options: BatchOptions) -> Self {
        Self { store, options }
    }

    /// Writes every entry as `/key` and tags it with the value's scalar kind.
    pub async fn import<P>(&self, flat: &FlatMap, mut on_progress: P) -> BatchReport
    where
        P: FnMut(Progress<'_>),
    {
        let description = self.options.description.clone();
        let jobs = flat
            .iter()
            .map(|(key, scalar)| (key.clone(), (parameter_name(key), scalar.clone())))
            .collect();
        let (report, _) = self
            .run(
                jobs,
                move |store, (name, scalar)| {
                    import_one(store, name, scalar, description.clone())
                },
                &mut on_progress,
            )
            .await;
        tracing::info!(
            total = report.total(),
            succeeded = report.succeeded(),
            skipped = report.skipped(),
            "import finished"
        );
        report
    }

    /// Removes the type tag and the parameter for every key.
    pub async fn delete<P>(&self, flat: &FlatMap, mut on_progress: P) -> BatchReport
    where
        P: FnMut(Progress<'_>),
    {
        let jobs = flat
            .keys()
            .map(|key| (key.clone(), parameter_name(key)))
            .collect();
        let (report, _) = self.run(jobs, delete_one, &mut on_progress).await;
        tracing::info!(
            total = report.total(),
            attempted = report.attempted(),
            succeeded = report.succeeded(),
            "delete finished"
        );
        report
    }

    /// Reads everything under `path`, restores scalar kinds from tags, and rebuilds the JSON.
    pub async fn export<P>(
        &self,
        path: &str,
        decrypt: bool,
        mut on_progress: P,
    ) -> Result<Value, Error>
    where
        P: FnMut(Progress<'_>),
    {
        let parameters = self.list_all(path, decrypt).await?;
        let mut jobs = Vec::with_capacity(parameters.len());
        for parameter in parameters {
            match flat_key(path, &parameter.name) {
                Some(key) => jobs.push((key, parameter)),
                None => tracing::debug!(
                    parameter = %parameter.name,
                    "skipping parameter that names the export path itself"
                ),
            }
        }

        let (report, values) = self.run(jobs, resolve_one, &mut on_progress).await;
        let mut flat = FlatMap::new();
        for (outcome, value) in report.outcomes.into_iter().zip(values) {
            if let Some(err) = outcome.status.error() {
                tracing::warn!(key = %outcome.key, error = %err, "dropping unreadable parameter");
            }
            if let Some(scalar) = value {
                flat.insert(outcome.key, scalar);
            }
        }
        tracing::info!(path, count = flat.len(), "export finished");
        unflatten(&flat)
    }

    async fn list_all(&self, path: &str, decrypt: bool) -> ApiResult<Vec<Parameter>> {
        let mut parameters = Vec::new();
        let mut next_token = None;
        loop {
            let page = self
                .store
                .list_by_prefix(path, true, decrypt, next_token.take())
                .await?;
            tracing::debug!(path, count = page.parameters.len(), "listed parameter page");
            parameters.extend(page.parameters);
            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }
        Ok(parameters)
    }

    async fn run<T, R, F, Fut, P>(
        &self,
        jobs: Vec<(String, T)>,
        work: F,
        on_progress: &mut P,
    ) -> (BatchReport, Vec<Option<R>>)
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(Arc<dyn ParameterStore>, T) -> Fut,
        Fut: Future<Output = (KeyStatus, Option<R>)> + Send + 'static,
        P: FnMut(Progress<'_>),
    {
        let total = jobs.len();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_on_error = self.options.stop_on_error;
        let mut collector = Collector::new(total);
        let mut workers = JoinSet::new();
        let mut task_index = HashMap::new();
        let mut dispatched = 0usize;

        for (index, (key, payload)) in jobs.into_iter().enumerate() {
            collector.keys.push(key);
            if stop_on_error && stop.load(Ordering::SeqCst) {
                tracing::debug!(key = %collector.keys[index], "skipping, an earlier call failed");
                collector.statuses[index] = Some(KeyStatus::Skipped);
                continue;
            }

            if let Some(pause) = self.options.pacing.pause_before(dispatched) {
                tracing::debug!(dispatched, pause_ms = pause.as_millis() as u64, "pacing dispatch");
                let deadline = tokio::time::Instant::now() + pause;
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => break,
                        Some(joined) = workers.join_next(), if !workers.is_empty() => {
                            collector.settle(joined, &task_index, on_progress);
                        }
                    }
                }
                if stop_on_error && stop.load(Ordering::SeqCst) {
                    tracing::debug!(key = %collector.keys[index], "skipping, an earlier call failed");
                    collector.statuses[index] = Some(KeyStatus::Skipped);
                    continue;
                }
            }

            let call = work(Arc::clone(&self.store), payload);
            let stop = Arc::clone(&stop);
            let handle = workers.spawn(async move {
                if stop_on_error && stop.load(Ordering::SeqCst) {
                    return (index, KeyStatus::Skipped, None);
                }
                let (status, value) = call.await;
                if status.error().is_some() {
                    stop.store(true, Ordering::SeqCst);
                }
                (index, status, value)
            });
            task_index.insert(handle.id(), index);
            dispatched += 1;
        }

        while let Some(joined) = workers.join_next().await {
            collector.settle(joined, &task_index, on_progress);
        }
        collector.finish()
    }
}

struct Collector<R> {
    total: usize,
    completed: usize,
    keys: Vec<String>,
    statuses: Vec<Option<KeyStatus>>,
    values: Vec<Option<R>>,
}

impl<R> Collector<R> {
    fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            keys: Vec::with_capacity(total),
            statuses: (0..total).map(|_| None).collect(),
            values: (0..total).map(|_| None).collect(),
        }
    }

    fn settle<P>(
        &mut self,
        joined: Result<(usize, KeyStatus, Option<R>), JoinError>,
        task_index: &HashMap<tokio::task::Id, usize>,
        on_progress: &mut P,
    ) where
        P: FnMut(Progress<'_>),
    {
        let index = match joined {
            Ok((index, status, value)) => {
                self.statuses[index] = Some(status);
                self.values[index] = value;
                index
            }
            Err(err) => {
                let Some(&index) = task_index.get(&err.id()) else {
                    tracing::error!(error = %err, "untracked worker failed");
                    return;
                };
                self.statuses[index] = Some(KeyStatus::Failed(
                    Error::new(ErrorKind::Internal)
                        .with_message("worker task failed")
                        .with_key(&self.keys[index])
                        .with_source(err),
                ));
                index
            }
        };
        self.completed += 1;
        on_progress(Progress {
            completed: self.completed,
            total: self.total,
            key: &self.keys[index],
        });
    }

    fn finish(self) -> (BatchReport, Vec<Option<R>>) {
        let outcomes = self
            .keys
            .into_iter()
            .zip(self.statuses)
            .map(|(key, status)| {
                let status = status.unwrap_or_else(|| {
                    KeyStatus::Failed(
                        Error::new(ErrorKind::Internal)
                            .with_message("worker did not report")
                            .with_key(&key),
                    )
                });
                KeyOutcome { key, status }
            })
            .collect();
        (BatchReport { outcomes }, self.values)
    }
}

fn parameter_name(key: &str) -> String {
    format!("{PATH_DELIMITER}{key}")
}

/// Strips the export path, then one leading `/`. `None` when nothing is left.
fn flat_key(path: &str, name: &str) -> Option<String> {
    let relative = name.strip_prefix(path).unwrap_or(name);
    let relative = relative.strip_prefix(PATH_DELIMITER).unwrap_or(relative);
    (!relative.is_empty()).then(|| relative.to_string())
}

async fn import_one(
    store: Arc<dyn ParameterStore>,
    name: String,
    scalar: Scalar,
    description: Option<String>,
) -> (KeyStatus, Option<()>) {
    let value = scalar.to_remote_string();
    if let Err(err) = store
        .set_value(&name, &value, true, description.as_deref())
        .await
    {
        return (KeyStatus::Failed(err), None);
    }
    let tags = [Tag::new(TYPE_TAG_KEY, scalar.tag())];
    match store.set_tags(&name, &tags).await {
        Ok(()) => (KeyStatus::Done, Some(())),
        Err(err) => (KeyStatus::Partial(err), Some(())),
    }
}

async fn delete_one(store: Arc<dyn ParameterStore>, name: String) -> (KeyStatus, Option<()>) {
    if let Err(err) = store.remove_tags(&name, &[TYPE_TAG_KEY.to_string()]).await {
        return (KeyStatus::Failed(err), None);
    }
    match store.delete_value(&name).await {
        Ok(()) => (KeyStatus::Done, Some(())),
        Err(err) => (KeyStatus::Failed(err), None),
    }
}

async fn resolve_one(
    store: Arc<dyn ParameterStore>,
    parameter: Parameter,
) -> (KeyStatus, Option<Scalar>) {
    let tag = match store.get_tags(&parameter.name).await {
        Ok(tags) => tags
            .into_iter()
            .find(|tag| tag.key == TYPE_TAG_KEY)
            .map(|tag| tag.value),
        Err(err) => {
            tracing::warn!(
                parameter = %parameter.name,
                error = %err,
                "failed to read type tag, assuming string"
            );
            None
        }
    };
    let tag = tag.unwrap_or_else(|| DEFAULT_TYPE_TAG.to_string());
    let scalar = match Scalar::coerce(&tag, &parameter.value) {
        Ok(scalar) => scalar,
        Err(err) => {
            tracing::warn!(parameter = %parameter.name, error = %err, "keeping value as string");
            Scalar::String(parameter.value)
        }
    };
    (KeyStatus::Done, Some(scalar))
}

#[cfg(test)]
mod tests {
    use super::{Pacing, flat_key};
    use std::time::Duration;

    #[test]
    fn pacing_pauses_after_each_full_batch() {
        let pacing = Pacing::new(10, Duration::from_secs(10));
        let pauses: Vec<usize> = (0..25)
            .filter(|dispatched| pacing.pause_before(*dispatched).is_some())
            .collect();
        assert_eq!(pauses, vec![10, 20]);
    }

    #[test]
    fn zero_batch_size_or_pause_disables_pacing() {
        assert!(Pacing::unpaced().pause_before(10).is_none());
        assert!(Pacing::new(10, Duration::ZERO).pause_before(10).is_none());
        assert!(Pacing::new(0, Duration::from_secs(1)).pause_before(10).is_none());
    }

    #[test]
    fn flat_key_strips_path_and_leading_slash() {
        assert_eq!(flat_key("/0", "/0/name").as_deref(), Some("name"));
        assert_eq!(flat_key("/", "/0/name").as_deref(), Some("0/name"));
        assert_eq!(flat_key("/app/", "/app/db/host").as_deref(), Some("db/host"));
        assert_eq!(flat_key("/app", "/app"), None);
    }
}
