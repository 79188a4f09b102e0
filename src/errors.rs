use std::io;

use thiserror::Error;

/// Ways an annotated peptide sequence can be malformed. Positions are byte
/// offsets into the annotated string.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SequenceError {
    #[error("unknown residue '{residue}' at position {position}")]
    UnknownResidue { residue: char, position: usize },
    #[error("modification run opened at position {position} while another run is open")]
    NestedRun { position: usize },
    #[error("')' at position {position} closes no modification run")]
    UnmatchedClose { position: usize },
    #[error("')' at position {position} is not followed by a '[' mass shift")]
    MissingShift { position: usize },
    #[error("mass shift starting at position {position} has no closing ']'")]
    UnterminatedShift { position: usize },
    #[error("mass shift '{literal}' is not a number")]
    InvalidShift { literal: String },
    #[error("modification run opened at position {position} is never closed")]
    UnterminatedRun { position: usize },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid sequence `{sequence}`: {source}")]
    Sequence {
        sequence: String,
        #[source]
        source: SequenceError,
    },
    #[error("invalid record at line {line}: {message}")]
    Record { line: u64, message: String },
    #[error("invalid histogram step {step}: {reason}")]
    HistogramStep { step: f64, reason: &'static str },
    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub fn record(line: u64, message: impl Into<String>) -> Self {
        Error::Record {
            line,
            message: message.into(),
        }
    }

    /// Parse errors only invalidate the record they were raised for; the
    /// surrounding batch keeps going.
    pub fn is_parse(&self) -> bool {
        matches!(self, Error::Sequence { .. } | Error::Record { .. })
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|pos| pos.line()).unwrap_or(0);
        match err.into_kind() {
            csv::ErrorKind::Io(io_err) => Error::Io(io_err),
            other => Error::record(line, format!("{:?}", other)),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_parse_and_io_failures() {
        let parse = Error::record(3, "bad charge");
        assert!(parse.is_parse());
        assert_eq!(parse.to_string(), "invalid record at line 3: bad charge");

        let io_err = Error::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(!io_err.is_parse());

        let step = Error::HistogramStep { step: 0.0, reason: "must be positive" };
        assert!(!step.is_parse());
    }
}
