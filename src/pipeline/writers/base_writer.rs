use crate::error::Result;

/// Trait for writing result rows to an output sink (e.g. file).
pub trait BaseWriter {
    /// Write one row of already rendered values.
    fn write_row(&mut self, row: &[String]) -> Result<()>;

    /// Flush and close the output writer.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}
