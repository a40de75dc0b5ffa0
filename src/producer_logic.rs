// src/producer_logic.rs

use tracing::{debug, info, warn};

use crate::data_model::WorkItem;
use crate::error::Result;
use crate::pipeline::readers::BaseReader;
use crate::pipeline::WorkQueue;
use crate::utils::prometheus_metrics::*;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadStats {
    pub rows: u64,
    pub warnings: u64,
    /// Reading stopped because the queue reached its capacity.
    pub hit_limit: bool,
}

/// Moves items from `reader` into `queue` in input order.
///
/// Runs before any worker starts, so a full queue ends reading instead of waiting.
/// Row warnings are logged as `Line {row} - {message}` and the row is still queued.
pub async fn populate_queue<R: BaseReader>(
    reader: &mut R,
    queue: &WorkQueue<WorkItem>,
) -> Result<ReadStats> {
    let mut stats = ReadStats::default();

    loop {
        if queue.is_full() {
            debug!(rows = stats.rows, "Queue is full, ignoring the rest of the input");
            stats.hit_limit = true;
            break;
        }

        let item = match reader.next() {
            Some(item) => item?,
            None => break,
        };

        for message in &item.warnings {
            warn!("Line {} - {}", item.row_id, message);
            INPUT_WARNINGS_TOTAL.inc();
        }
        stats.rows += 1;
        stats.warnings += item.warnings.len() as u64;
        ROWS_READ_TOTAL.inc();

        queue.put(item).await;
    }

    info!(
        rows = stats.rows,
        warnings = stats.warnings,
        "Finished reading input"
    );
    Ok(stats)
}
