//! Purpose: Hold top-level CLI command dispatch for `json2ssm`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap; run each command against the store.
//! Invariants: File and decode errors surface before the AWS client is built.
//! Invariants: Batch failures are reported once, after every dispatched call settled.
//! Invariants: Progress is drawn on stderr only when stderr is a TTY.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;
use std::sync::Arc;

use clap::CommandFactory;
use json2ssm::api::{
    BatchExecutor, BatchSummary, FlatMap, ParameterStore, Progress, SsmStore, flatten_reader,
};

use super::*;

pub(super) fn dispatch_command(command: Command, settings: Settings) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "json2ssm", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::PutJson {
            json_file,
            description,
        } => {
            let flat = read_flat_map(&json_file)?;
            let mut batch = settings.batch;
            batch.description = description;
            let runtime = build_runtime()?;
            let summary = runtime.block_on(async {
                let executor = BatchExecutor::new(connect(settings.ssm).await, batch);
                let mut progress = ProgressLine::new("written");
                let report = executor
                    .import(&flat, |update| progress.update(update))
                    .await;
                progress.finish();
                report.into_result()
            })?;
            emit_summary(
                "imported",
                summary,
                format!(
                    "Import has successfully finished, {} parameters have been (over)written to SSM parameter store.",
                    summary.succeeded
                ),
            );
            Ok(RunOutcome::ok())
        }
        Command::DelJson { json_file } => {
            let flat = read_flat_map(&json_file)?;
            let runtime = build_runtime()?;
            let summary = runtime.block_on(async {
                let executor = BatchExecutor::new(connect(settings.ssm).await, settings.batch);
                let mut progress = ProgressLine::new("deleted");
                let report = executor
                    .delete(&flat, |update| progress.update(update))
                    .await;
                progress.finish();
                report.into_result()
            })?;
            emit_summary(
                "deleted",
                summary,
                format!(
                    "Deletion has successfully finished, {} parameters have been removed from SSM parameter store.",
                    summary.attempted
                ),
            );
            Ok(RunOutcome::ok())
        }
        Command::GetJson {
            path,
            decrypt,
            compact,
        } => {
            let runtime = build_runtime()?;
            let value = runtime.block_on(async {
                let executor = BatchExecutor::new(connect(settings.ssm).await, settings.batch);
                let mut progress = ProgressLine::new("fetched");
                let value = executor
                    .export(&path, decrypt, |update| progress.update(update))
                    .await;
                progress.finish();
                value
            })?;
            emit_document(&value, compact)?;
            Ok(RunOutcome::ok())
        }
    }
}

fn build_runtime() -> Result<tokio::runtime::Runtime, Error> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to start runtime")
                .with_source(err)
        })
}

async fn connect(config: SsmConfig) -> Arc<dyn ParameterStore> {
    Arc::new(SsmStore::connect(config).await)
}

fn read_flat_map(path: &Path) -> Result<FlatMap, Error> {
    let file = File::open(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("error while opening file")
            .with_path(path)
            .with_hint("Check the --json-file path.")
            .with_source(err)
    })?;
    flatten_reader(BufReader::new(file)).map_err(|err| err.with_path(path))
}

fn emit_summary(label: &str, summary: BatchSummary, human: String) {
    if io::stdout().is_terminal() {
        println!("\n{human}");
        return;
    }
    let value = json!({ label: summary });
    println!("{value}");
}

fn emit_document(value: &Value, compact: bool) -> Result<(), Error> {
    let text = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("json encode failed")
            .with_source(err)
    })?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{text}").map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to write output")
            .with_source(err)
    })
}

/// Single-line `\r` progress counter on an interactive stderr.
struct ProgressLine {
    verb: &'static str,
    enabled: bool,
    drawn: bool,
}

impl ProgressLine {
    fn new(verb: &'static str) -> Self {
        Self {
            verb,
            enabled: io::stderr().is_terminal(),
            drawn: false,
        }
    }

    fn update(&mut self, progress: Progress<'_>) {
        if !self.enabled {
            return;
        }
        eprint!(
            "\r{} {}/{} parameters",
            self.verb, progress.completed, progress.total
        );
        self.drawn = true;
    }

    fn finish(&self) {
        if self.drawn {
            eprintln!();
        }
    }
}
