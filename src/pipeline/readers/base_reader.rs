use crate::data_model::WorkItem;
use crate::error::Result;

/// A single-pass source of work items.
pub trait BaseReader: Iterator<Item = Result<WorkItem>> {
    /// Consumes the first record as column names. `None` when the input is empty.
    fn read_header(&mut self) -> Result<Option<Vec<String>>>;
}
