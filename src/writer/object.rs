//! Whole-log buffering writer.

use super::{LogWriter, Protocol};
use crate::error::Error;
use crate::model::{ConversionRun, LogicalLocation, ResultRecord, ToolInfo};

/// Buffers an entire conversion into a [`ConversionRun`] object graph, for
/// tests and for callers that post-process the run before serializing it.
pub struct ObjectWriter {
    protocol: Protocol,
    run: ConversionRun,
}

impl ObjectWriter {
    pub fn new() -> Self {
        Self {
            protocol: Protocol::new(),
            run: ConversionRun::default(),
        }
    }

    /// The buffered run. Valid whether or not the caller closed the result
    /// stream; the object graph is structurally complete at every state.
    #[inline]
    pub fn into_run(self) -> ConversionRun {
        self.run
    }
}

impl Default for ObjectWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl LogWriter for ObjectWriter {
    fn initialize(&mut self, tool: &ToolInfo) -> Result<(), Error> {
        self.protocol.initialize()?;
        self.run.tool = tool.clone();
        Ok(())
    }

    fn open_results(&mut self) -> Result<(), Error> {
        self.protocol.open_results()?;
        Ok(())
    }

    fn write_results(&mut self, results: &[ResultRecord]) -> Result<(), Error> {
        self.protocol.write_results()?;
        self.run.results.extend_from_slice(results);
        Ok(())
    }

    fn close_results(&mut self) -> Result<(), Error> {
        self.protocol.close_results()?;
        Ok(())
    }

    fn write_logical_locations(&mut self, nodes: &[LogicalLocation]) -> Result<(), Error> {
        self.protocol.write_logical_locations()?;
        self.run.logical_locations.extend_from_slice(nodes);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::Level;

    #[test]
    fn preserves_result_order_across_batches() {
        let mut w = ObjectWriter::new();
        w.initialize(&ToolInfo::new("tool")).unwrap();
        w.open_results().unwrap();

        let batch: Vec<ResultRecord> = (0..3)
            .map(|i| ResultRecord {
                message: format!("result {i}"),
                level: Level::Note,
                ..Default::default()
            })
            .collect();

        w.write_results(&batch[..2]).unwrap();
        w.write_results(&batch[2..]).unwrap();
        w.close_results().unwrap();

        let run = w.into_run();
        let messages: Vec<_> = run.results.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, ["result 0", "result 1", "result 2"]);
    }
}
