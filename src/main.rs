//! Purpose: `json2ssm` CLI entry point.
//! Role: Binary crate root; parses args, sets up logging, delegates to command dispatch.
//! Invariants: Success summaries go to stdout (human on a TTY, JSON otherwise).
//! Invariants: Errors go to stderr (human on a TTY, JSON otherwise); logs go to stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Input files are read and flattened before any AWS call is made.
#![allow(clippy::result_large_err)]
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;

use json2ssm::api::{
    BatchOptions, DEFAULT_BATCH_PAUSE, DEFAULT_BATCH_SIZE, Error, ErrorKind, Pacing, SsmConfig,
    to_exit_code,
};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint("Try `json2ssm --help`."),
                    ColorMode::Auto,
                ));
            }
        },
    };

    init_tracing(cli.debug);

    let color_mode = cli.color;
    let settings = Settings {
        batch: cli.batch_options(),
        ssm: cli.aws.into_config(),
    };

    command_dispatch::dispatch_command(cli.command, settings)
        .map_err(add_remote_hint)
        .map_err(|err| (err, color_mode))
}

/// Options shared by every command that talks to the parameter store.
struct Settings {
    batch: BatchOptions,
    ssm: SsmConfig,
}

#[derive(Parser)]
#[command(
    name = "json2ssm",
    version,
    about = "Store JSON documents in AWS SSM Parameter Store, and get them back",
    long_about = None,
    before_help = r#"Every JSON leaf becomes one parameter; its name is the slash-joined path to it.
Array positions become numeric segments. The original scalar type is kept in a `type` tag."#,
    after_help = r#"EXAMPLES
  $ json2ssm put-json --json-file config.json
  $ json2ssm get-json --path /app > config.json
  $ json2ssm del-json --json-file config.json

  # config.json = {"app": {"db": {"port": 5432}}} becomes /app/db/port = "5432" (type=float64)

ENVIRONMENT
  AWS credentials and region are resolved the usual way (AWS_PROFILE, AWS_REGION, ~/.aws/config).
  RUST_LOG overrides the log filter chosen by --debug."#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(short, long, global = true, help = "Enable debug logging")]
    debug: bool,
    #[arg(
        long,
        global = true,
        help = "Stop dispatching new calls once one has failed (calls in flight still finish)"
    )]
    stop_on_error: bool,
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_BATCH_SIZE,
        help = "Calls dispatched between pauses (0 disables pacing)"
    )]
    batch_size: usize,
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_BATCH_PAUSE.as_millis() as u64,
        help = "Pause between dispatch batches, in milliseconds"
    )]
    batch_pause_ms: u64,
    #[arg(
        long,
        global = true,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,
    #[command(flatten)]
    aws: AwsArgs,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            pacing: Pacing::new(self.batch_size, Duration::from_millis(self.batch_pause_ms)),
            stop_on_error: self.stop_on_error,
            description: None,
        }
    }
}

#[derive(Args, Debug, Default)]
struct AwsArgs {
    #[arg(long, global = true, help = "AWS region (default: from the AWS config chain)")]
    region: Option<String>,
    #[arg(long, global = true, help = "AWS shared config profile")]
    profile: Option<String>,
    #[arg(
        long,
        global = true,
        value_hint = ValueHint::Url,
        help = "Custom SSM endpoint (e.g. a local emulator)"
    )]
    endpoint_url: Option<String>,
}

impl AwsArgs {
    fn into_config(self) -> SsmConfig {
        SsmConfig {
            region: self.region,
            profile: self.profile,
            endpoint: self.endpoint_url,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Creates SSM parameters from the specified JSON file",
        after_help = r#"EXAMPLES
  $ json2ssm put-json --json-file config.json
  $ json2ssm put-json --json-file config.json --description "managed by json2ssm"
  $ json2ssm put-json --json-file big.json --batch-size 20 --batch-pause-ms 15000

NOTES
  - Existing parameters are overwritten.
  - Partial success is normal: on failure the count of written parameters is reported."#
    )]
    PutJson {
        #[arg(long, value_hint = ValueHint::FilePath, help = "The path where your JSON file is located")]
        json_file: PathBuf,
        #[arg(long, help = "Description stored on every parameter")]
        description: Option<String>,
    },
    #[command(
        about = "Retrieves a JSON document from SSM parameter store using the given path (prefix)",
        after_help = r#"EXAMPLES
  $ json2ssm get-json --path /app
  $ json2ssm get-json --path /app --decrypt --compact"#
    )]
    GetJson {
        #[arg(long, help = "SSM parameter store path (prefix)")]
        path: String,
        #[arg(long, help = "Decrypt SecureString values")]
        decrypt: bool,
        #[arg(long, help = "Emit single-line JSON")]
        compact: bool,
    },
    #[command(
        about = "Deletes parameters from SSM parameter store based on the specified JSON file",
        after_help = r#"EXAMPLES
  $ json2ssm del-json --json-file config.json"#
    )]
    DelJson {
        #[arg(long, value_hint = ValueHint::FilePath, help = "The path where your JSON file is located")]
        json_file: PathBuf,
    },
    #[command(about = "Generate shell completion scripts")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "json2ssm=debug,warn" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn add_remote_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Remote || err.hint().is_some() {
        return err;
    }
    err.with_hint("Check AWS credentials/region; rerun with --debug for per-parameter logs.")
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Decode => "invalid json".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
        ErrorKind::Remote => "parameter store call failed".to_string(),
        ErrorKind::PathConflict => "conflicting parameter paths".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("file".to_string(), json!(path.display().to_string()));
    }
    if let Some(key) = err.key() {
        inner.insert("key".to_string(), json!(key));
    }
    if let Some(completed) = err.completed() {
        inner.insert("completed".to_string(), json!(completed));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("file:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }
    if let Some(key) = err.key() {
        lines.push(format!(
            "{} {key}",
            colorize_label("key:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(completed) = err.completed() {
        lines.push(format!(
            "{} {completed} parameter(s) succeeded before the failure was reported",
            colorize_label("completed:", use_color, AnsiColor::Yellow)
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, error_json, error_text};
    use clap::Parser;
    use json2ssm::api::{Error, ErrorKind};
    use std::time::Duration;

    #[test]
    fn error_text_respects_color_flag() {
        let err = Error::new(ErrorKind::Usage).with_message("bad input");
        let colored = error_text(&err, true);
        let plain = error_text(&err, false);
        assert!(colored.contains("\u{1b}[31merror:\u{1b}[0m"));
        assert!(plain.contains("error:"));
        assert!(!plain.contains("\u{1b}["));
    }

    #[test]
    fn error_json_reports_key_and_completed_count() {
        let err = Error::new(ErrorKind::Remote)
            .with_message("put parameter failed")
            .with_key("/app/name")
            .with_completed(5);
        let value = error_json(&err);
        assert_eq!(value["error"]["kind"], "Remote");
        assert_eq!(value["error"]["key"], "/app/name");
        assert_eq!(value["error"]["completed"], 5);
    }

    #[test]
    fn global_flags_build_batch_options() {
        let cli = Cli::try_parse_from([
            "json2ssm",
            "put-json",
            "--json-file",
            "config.json",
            "--stop-on-error",
            "--batch-size",
            "20",
            "--batch-pause-ms",
            "15000",
        ])
        .expect("parse");
        let options = cli.batch_options();
        assert!(options.stop_on_error);
        assert_eq!(options.pacing.batch_size, 20);
        assert_eq!(options.pacing.pause, Duration::from_secs(15));
        assert!(matches!(cli.command, Command::PutJson { .. }));
    }

    #[test]
    fn get_json_requires_path() {
        assert!(Cli::try_parse_from(["json2ssm", "get-json"]).is_err());
        let cli = Cli::try_parse_from(["json2ssm", "get-json", "--path", "/app", "--decrypt"])
            .expect("parse");
        match cli.command {
            Command::GetJson { path, decrypt, .. } => {
                assert_eq!(path, "/app");
                assert!(decrypt);
            }
            _ => panic!("expected get-json"),
        }
    }
}
