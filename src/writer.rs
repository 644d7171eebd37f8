//! The two-phase log writer protocol.
//!
//! A [`LogWriter`] is the sink side of a conversion: the orchestrator
//! initializes it with the tool identity, brackets the result stream with
//! open/close, and may hand over the logical-location table once at any
//! point in between. The strict state order decouples normalization from
//! final serialization — a writer may buffer the whole log into an object
//! graph ([`ObjectWriter`]) or serialize incrementally to a stream
//! ([`JsonWriter`]); the protocol only fixes ordering and state discipline.

pub mod json;
pub mod object;

pub use json::JsonWriter;
pub use object::ObjectWriter;

use crate::error::{Error, ProtocolViolation};
use crate::model::{LogicalLocation, ResultRecord, ToolInfo};
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum WriterState {
    Uninitialized,
    Initialized,
    ResultsOpen,
    ResultsClosed,
}

impl fmt::Display for WriterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::ResultsOpen => "results-open",
            Self::ResultsClosed => "results-closed",
        })
    }
}

/// Strictly ordered sink for one conversion run.
///
/// Legal call order is `initialize` → `open_results` → any number of
/// `write_results` calls → `close_results`, with `write_logical_locations`
/// permitted at most once either side of the results block (some formats
/// know their location table up front, others only after streaming).
/// Skipping or repeating a transition is a [`ProtocolViolation`]. Result
/// input order is preserved in the output.
pub trait LogWriter {
    fn initialize(&mut self, tool: &ToolInfo) -> Result<(), Error>;
    fn open_results(&mut self) -> Result<(), Error>;
    fn write_results(&mut self, results: &[ResultRecord]) -> Result<(), Error>;
    fn close_results(&mut self) -> Result<(), Error>;
    fn write_logical_locations(&mut self, nodes: &[LogicalLocation]) -> Result<(), Error>;
}

/// The shared state machine; each writer implementation embeds one and
/// consults it before touching its own output.
pub(crate) struct Protocol {
    state: WriterState,
    logical_locations_written: bool,
}

impl Protocol {
    pub(crate) fn new() -> Self {
        Self {
            state: WriterState::Uninitialized,
            logical_locations_written: false,
        }
    }

    #[inline]
    pub(crate) fn state(&self) -> WriterState {
        self.state
    }

    fn expect(&self, operation: &'static str, expected: WriterState) -> Result<(), ProtocolViolation> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ProtocolViolation {
                operation,
                state: self.state,
            })
        }
    }

    pub(crate) fn initialize(&mut self) -> Result<(), ProtocolViolation> {
        self.expect("initialize", WriterState::Uninitialized)?;
        self.state = WriterState::Initialized;
        Ok(())
    }

    pub(crate) fn open_results(&mut self) -> Result<(), ProtocolViolation> {
        self.expect("open_results", WriterState::Initialized)?;
        self.state = WriterState::ResultsOpen;
        Ok(())
    }

    pub(crate) fn write_results(&self) -> Result<(), ProtocolViolation> {
        self.expect("write_results", WriterState::ResultsOpen)
    }

    pub(crate) fn close_results(&mut self) -> Result<(), ProtocolViolation> {
        self.expect("close_results", WriterState::ResultsOpen)?;
        self.state = WriterState::ResultsClosed;
        Ok(())
    }

    pub(crate) fn write_logical_locations(&mut self) -> Result<(), ProtocolViolation> {
        if !matches!(
            self.state,
            WriterState::Initialized | WriterState::ResultsClosed
        ) || self.logical_locations_written
        {
            return Err(ProtocolViolation {
                operation: "write_logical_locations",
                state: self.state,
            });
        }

        self.logical_locations_written = true;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::ToolInfo;

    #[test]
    fn transitions_must_be_in_order() {
        let mut w = ObjectWriter::new();

        // cannot open or write before initializing
        assert!(w.open_results().is_err());
        assert!(w.write_results(&[]).is_err());

        w.initialize(&ToolInfo::new("tool")).unwrap();
        assert!(w.initialize(&ToolInfo::new("tool")).is_err());
        assert!(w.close_results().is_err());

        w.open_results().unwrap();
        assert!(w.open_results().is_err());

        w.close_results().unwrap();
        assert!(w.write_results(&[]).is_err());
        assert!(w.close_results().is_err());
    }

    #[test]
    fn zero_write_calls_is_a_valid_run() {
        let mut w = ObjectWriter::new();
        w.initialize(&ToolInfo::new("tool")).unwrap();
        w.open_results().unwrap();
        w.close_results().unwrap();

        let run = w.into_run();
        assert_eq!(run.tool.name, "tool");
        assert!(run.results.is_empty());
    }

    #[test]
    fn logical_locations_may_be_written_once() {
        let mut w = ObjectWriter::new();
        assert!(w.write_logical_locations(&[]).is_err());

        w.initialize(&ToolInfo::new("tool")).unwrap();
        w.write_logical_locations(&[]).unwrap();
        assert!(w.write_logical_locations(&[]).is_err());
    }
}
