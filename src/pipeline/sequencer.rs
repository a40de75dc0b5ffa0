// src/pipeline/sequencer.rs

use std::collections::BTreeMap;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::data_model::GeocodeResult;
use crate::error::{PipelineError, Result};
use crate::pipeline::fields::FieldLookup;
use crate::pipeline::writers::BaseWriter;

/// Order in which result rows reach the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputOrder {
    /// Input order, whatever the completion order.
    #[default]
    Ordered,
    /// Completion order.
    Unordered,
}

struct SequencerState<S> {
    sink: S,
    /// Next row id eligible for writing in ordered mode.
    next_row: u64,
    pending: BTreeMap<u64, Vec<String>>,
    written: usize,
}

impl<S: BaseWriter> SequencerState<S> {
    fn write(&mut self, row_id: u64, row: &[String]) -> Result<()> {
        self.sink.write_row(row)?;
        self.written += 1;
        debug!(row_id, "wrote result row");
        Ok(())
    }

    fn flush_ready(&mut self) -> Result<usize> {
        let mut flushed = 0;
        while let Some(row) = self.pending.remove(&self.next_row) {
            let row_id = self.next_row;
            self.write(row_id, &row)?;
            self.next_row += 1;
            flushed += 1;
        }
        Ok(flushed)
    }
}

/// Single writer in front of the output sink.
///
/// Appends the derived columns to each input row and, in ordered mode, parks rows
/// that complete early until every earlier row has been written.
pub struct OutputSequencer<S: BaseWriter> {
    state: Mutex<SequencerState<S>>,
    columns: Vec<String>,
    lookup: FieldLookup,
    order: OutputOrder,
}

impl<S: BaseWriter> OutputSequencer<S> {
    pub fn new(sink: S, columns: Vec<String>, lookup: FieldLookup, order: OutputOrder) -> Self {
        OutputSequencer {
            state: Mutex::new(SequencerState {
                sink,
                next_row: 1,
                pending: BTreeMap::new(),
                written: 0,
            }),
            columns,
            lookup,
            order,
        }
    }

    /// Writes `input_header` followed by the derived column names. Must come before any row.
    pub async fn write_header(&self, input_header: &[String]) -> Result<()> {
        let mut row = input_header.to_vec();
        row.extend(self.columns.iter().cloned());
        let mut state = self.state.lock().await;
        state.sink.write_row(&row)
    }

    pub fn compose_row(&self, result: &GeocodeResult, original_fields: Vec<String>) -> Vec<String> {
        let mut row = original_fields;
        row.extend(self.lookup.derive(result, &self.columns));
        row
    }

    /// Hands over the result for `row_id`. Returns how many rows reached the sink.
    pub async fn submit(
        &self,
        row_id: u64,
        result: &GeocodeResult,
        original_fields: Vec<String>,
    ) -> Result<usize> {
        let row = self.compose_row(result, original_fields);
        let mut state = self.state.lock().await;

        match self.order {
            OutputOrder::Unordered => {
                state.write(row_id, &row)?;
                Ok(1)
            }
            OutputOrder::Ordered => {
                if row_id < state.next_row || state.pending.contains_key(&row_id) {
                    return Err(PipelineError::Unexpected(format!(
                        "row {} was submitted twice",
                        row_id
                    )));
                }
                state.pending.insert(row_id, row);
                state.flush_ready()
            }
        }
    }

    pub async fn next_row(&self) -> u64 {
        self.state.lock().await.next_row
    }

    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn rows_written(&self) -> usize {
        self.state.lock().await.written
    }

    /// Releases the sink. Rows still parked behind a gap are written in id order.
    pub fn into_sink(self) -> Result<(S, usize)> {
        let mut state = self.state.into_inner();
        if !state.pending.is_empty() {
            warn!(
                parked = state.pending.len(),
                next_row = state.next_row,
                "Writing rows left behind a missing row"
            );
            let leftovers = std::mem::take(&mut state.pending);
            for (row_id, row) in leftovers {
                state.write(row_id, &row)?;
            }
        }
        Ok((state.sink, state.written))
    }
}
