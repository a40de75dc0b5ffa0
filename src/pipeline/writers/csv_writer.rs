use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use csv::{QuoteStyle, WriterBuilder};

use crate::error::{PipelineError, Result};
use crate::pipeline::writers::BaseWriter;

/// Writes result rows as comma separated values.
pub struct CsvWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvWriter<W> {
    pub fn new(inner: W) -> Self {
        let writer = WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .quote_style(QuoteStyle::Necessary)
            .from_writer(inner);
        CsvWriter { writer }
    }

    /// Flushes and hands back the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| PipelineError::IoError {
                source: std::io::Error::new(e.error().kind(), e.error().to_string()),
            })
    }
}

impl CsvWriter<File> {
    /// Creates `path`, failing if it already exists.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;
        Ok(CsvWriter::new(file))
    }
}

impl<W: Write> BaseWriter for CsvWriter<W> {
    fn write_row(&mut self, row: &[String]) -> Result<()> {
        self.writer.write_record(row)?;
        Ok(())
    }

    fn close(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
