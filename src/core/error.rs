//! Purpose: Single error type shared by the codec, the batch executor and the CLI.
//! Exports: `Error`, `ErrorKind`, `to_exit_code`.
//! Role: Carries a stable kind plus optional context (file, parameter key, progress).
//! Invariants: `ErrorKind` to exit code mapping is stable once published.
//! Invariants: Context fields are additive; `Display` never includes the source chain.
use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    Decode,
    Io,
    Remote,
    PathConflict,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    path: Option<PathBuf>,
    key: Option<String>,
    completed: Option<u64>,
    hint: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            path: None,
            key: None,
            completed: None,
            hint: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn path(&self) -> Option<&std::path::Path> {
        self.path.as_deref()
    }

    /// Parameter name or flat key the error is about.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Number of operations that succeeded before the batch reported this error.
    pub fn completed(&self) -> Option<u64> {
        self.completed
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_completed(mut self, completed: u64) -> Self {
        self.completed = Some(completed);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (file: {})", path.display())?;
        }
        if let Some(key) = &self.key {
            write!(f, " (key: {key})")?;
        }
        if let Some(completed) = self.completed {
            write!(f, " (completed: {completed})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::Decode => 3,
        ErrorKind::Io => 4,
        ErrorKind::Remote => 5,
        ErrorKind::PathConflict => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind, to_exit_code};

    #[test]
    fn exit_code_mapping_is_stable() {
        let cases = [
            (ErrorKind::Internal, 1),
            (ErrorKind::Usage, 2),
            (ErrorKind::Decode, 3),
            (ErrorKind::Io, 4),
            (ErrorKind::Remote, 5),
            (ErrorKind::PathConflict, 6),
        ];

        for (kind, code) in cases {
            assert_eq!(to_exit_code(kind), code);
        }
    }

    #[test]
    fn display_includes_context_fields() {
        let err = Error::new(ErrorKind::Remote)
            .with_message("put parameter failed")
            .with_key("/app/name")
            .with_completed(4);
        assert_eq!(
            err.to_string(),
            "Remote: put parameter failed (key: /app/name) (completed: 4)"
        );
    }
}
