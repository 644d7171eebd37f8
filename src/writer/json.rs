//! Incremental JSON log writer.

use super::{LogWriter, Protocol, WriterState};
use crate::error::Error;
use crate::model::{LogicalLocation, ResultRecord, ToolInfo};
use std::io::Write;

const SCHEMA_URI: &str = "https://json.schemastore.org/sarif-2.1.0.json";
const SCHEMA_VERSION: &str = "2.1.0";

/// Serializes a conversion run to `out` as it is produced, without buffering
/// the results: each `write_results` batch goes straight to the stream.
///
/// Callers end the log with [`JsonWriter::finish`]. A writer dropped before
/// that still closes every bracket it opened so the output parses, but the
/// drop path swallows I/O errors; it is a fallback, not the API.
pub struct JsonWriter<W: Write> {
    protocol: Protocol,
    out: W,
    results_written: usize,
    finished: bool,
}

impl<W: Write> JsonWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            protocol: Protocol::new(),
            out,
            results_written: 0,
            finished: false,
        }
    }

    /// Completes the log. If the caller never opened (or never closed) the
    /// results array, an empty (or truncated-at-last-batch) one is closed
    /// here so the output is still structurally valid.
    pub fn finish(mut self) -> Result<(), Error> {
        // mark before closing so a failed close is not retried from drop
        self.finished = true;
        self.close_out()
    }

    fn close_out(&mut self) -> Result<(), Error> {
        match self.protocol.state() {
            WriterState::Uninitialized => {
                // nothing was ever written; emit a minimal empty log
                write!(
                    self.out,
                    "{{\"$schema\":{},\"version\":{},\"runs\":[]}}",
                    serde_json::to_string(SCHEMA_URI)?,
                    serde_json::to_string(SCHEMA_VERSION)?,
                )?;
            }
            WriterState::Initialized => {
                self.out.write_all(b",\"results\":[]}]}")?;
            }
            WriterState::ResultsOpen => {
                self.out.write_all(b"]}]}")?;
            }
            WriterState::ResultsClosed => {
                self.out.write_all(b"}]}")?;
            }
        }

        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> LogWriter for JsonWriter<W> {
    fn initialize(&mut self, tool: &ToolInfo) -> Result<(), Error> {
        self.protocol.initialize()?;

        write!(
            self.out,
            "{{\"$schema\":{},\"version\":{},\"runs\":[{{\"tool\":{{\"driver\":",
            serde_json::to_string(SCHEMA_URI)?,
            serde_json::to_string(SCHEMA_VERSION)?,
        )?;
        serde_json::to_writer(&mut self.out, tool)?;
        // close only the tool object; the run stays open for close_out
        self.out.write_all(b"}")?;
        Ok(())
    }

    fn open_results(&mut self) -> Result<(), Error> {
        self.protocol.open_results()?;
        self.out.write_all(b",\"results\":[")?;
        Ok(())
    }

    fn write_results(&mut self, results: &[ResultRecord]) -> Result<(), Error> {
        self.protocol.write_results()?;

        for result in results {
            if self.results_written > 0 {
                self.out.write_all(b",")?;
            }
            serde_json::to_writer(&mut self.out, result)?;
            self.results_written += 1;
        }

        Ok(())
    }

    fn close_results(&mut self) -> Result<(), Error> {
        self.protocol.close_results()?;
        self.out.write_all(b"]")?;
        Ok(())
    }

    fn write_logical_locations(&mut self, nodes: &[LogicalLocation]) -> Result<(), Error> {
        self.protocol.write_logical_locations()?;

        self.out.write_all(b",\"logicalLocations\":")?;
        serde_json::to_writer(&mut self.out, nodes)?;
        Ok(())
    }
}

impl<W: Write> Drop for JsonWriter<W> {
    fn drop(&mut self) {
        if !self.finished {
            log::warn!("json log writer dropped without finish; closing defensively");
            if let Err(err) = self.close_out() {
                log::error!("failed to close dropped json log writer: {err}");
            }
        }
    }
}
