//! Purpose: Provide the internal JSON decode entrypoints and failure categories.
//! Exports: `from_slice`, `decode_error`, `ParseFailureCategory`, `categorize_error`.
//! Role: Parser boundary that centralizes serde_json usage and error mapping.
//! Invariants: Category labels are stable strings used in user-facing hints.
//! Notes: Callers add file context (`with_path`) so domain context stays explicit.

use serde::de::DeserializeOwned;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ParseFailureCategory {
    Syntax,
    UnexpectedEof,
    Data,
    Io,
}

impl ParseFailureCategory {
    pub(crate) fn label(self) -> &'static str {
        match self {
            ParseFailureCategory::Syntax => "syntax",
            ParseFailureCategory::UnexpectedEof => "unexpected-eof",
            ParseFailureCategory::Data => "data",
            ParseFailureCategory::Io => "io",
        }
    }
}

pub(crate) fn from_slice<T: DeserializeOwned>(input: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(input)
}

pub(crate) fn categorize_error(err: &serde_json::Error) -> ParseFailureCategory {
    use serde_json::error::Category;
    match err.classify() {
        Category::Syntax => ParseFailureCategory::Syntax,
        Category::Eof => ParseFailureCategory::UnexpectedEof,
        Category::Data => ParseFailureCategory::Data,
        Category::Io => ParseFailureCategory::Io,
    }
}

pub(crate) fn hint_for_error(err: &serde_json::Error, context: &str) -> String {
    format!(
        "parse category: {}; line {}, column {}; context: {context}",
        categorize_error(err).label(),
        err.line(),
        err.column()
    )
}

/// Maps a serde_json failure to a `Decode` error with a category hint.
pub(crate) fn decode_error(err: serde_json::Error, context: &str) -> Error {
    let hint = hint_for_error(&err, context);
    Error::new(ErrorKind::Decode)
        .with_message("invalid json")
        .with_hint(hint)
        .with_source(err)
}

#[cfg(test)]
mod tests {
    use super::{ParseFailureCategory, categorize_error, decode_error, from_slice};
    use crate::core::error::ErrorKind;
    use serde_json::Value;

    #[test]
    fn category_mapping_handles_syntax_and_eof() {
        let syntax_err = from_slice::<Value>(br#"{"a":}"#).unwrap_err();
        assert_eq!(categorize_error(&syntax_err), ParseFailureCategory::Syntax);

        let eof_err = from_slice::<Value>(br#"{"a": [1, 2"#).unwrap_err();
        assert_eq!(
            categorize_error(&eof_err),
            ParseFailureCategory::UnexpectedEof
        );
    }

    #[test]
    fn decode_error_carries_category_and_context() {
        let err = from_slice::<Value>(b"not-json").unwrap_err();
        let err = decode_error(err, "put-json input");
        assert_eq!(err.kind(), ErrorKind::Decode);
        let hint = err.hint().expect("hint");
        assert!(hint.contains("parse category: syntax"));
        assert!(hint.contains("context: put-json input"));
    }
}
