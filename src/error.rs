//! The error taxonomy for a conversion run.
//!
//! Three failure kinds exist: malformed input ([`FormatError`]), a tool
//! identifier nothing in the registry chain can satisfy
//! ([`ResolutionError`]), and a caller driving the writer state machine out
//! of order ([`ProtocolViolation`]). Degraded-but-valid data is never an
//! error; it is normalized to a documented default and logged.

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),
    #[error("i/o error while converting")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize output log")]
    Json(#[from] serde_json::Error),
}

/// Malformed or unexpected structure in a source log.
///
/// Raised the first time an expectation is violated; the pipeline aborts for
/// that input rather than attempting partial recovery. `offset` is the byte
/// position in the input stream at which the violation was detected.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("unexpected element at byte {offset}: expected <{expected}>, found <{found}>")]
    UnexpectedElement {
        offset: u64,
        expected: String,
        found: String,
    },
    #[error("unexpected end of input at byte {offset}: expected <{expected}>")]
    UnexpectedEof { offset: u64, expected: String },
    #[error("element <{element}> at byte {offset} is missing required field '{field}'")]
    MissingField {
        offset: u64,
        element: String,
        field: String,
    },
    #[error("invalid value '{value}' for {field} at byte {offset}: expected {expected}")]
    InvalidValue {
        offset: u64,
        field: String,
        value: String,
        expected: &'static str,
    },
    #[error("malformed xml at byte {offset}")]
    Xml {
        offset: u64,
        #[source]
        source: quick_xml::Error,
    },
}

/// The orchestrator could not find a converter for the requested tool.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("no converter is registered for tool '{tool}'")]
    UnknownTool { tool: String },
    #[error("a converter for tool '{tool}' is already registered")]
    DuplicateTool { tool: String },
}

/// The log writer state machine was driven out of order.
///
/// This is a programming error in the caller, not a data error.
#[derive(Debug, thiserror::Error)]
#[error("log writer protocol violation: {operation} called in state {state}")]
pub struct ProtocolViolation {
    pub operation: &'static str,
    pub state: crate::writer::WriterState,
}
