// src/executor.rs

use std::io::BufRead;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::batch::BatchOptions;
use crate::data_model::WorkItem;
use crate::error::{PipelineError, Result};
use crate::geocoder::{ApiParams, Geocoder};
use crate::pipeline::readers::{BaseReader, LineReader, LineReaderConfig};
use crate::pipeline::writers::BaseWriter;
use crate::pipeline::{OutputSequencer, ProgressReporter, RetryPolicy, WorkQueue};
use crate::producer_logic::populate_queue;
use crate::worker_logic::{spawn_workers, WorkerContext, WorkerStats};

/// Query sent once before a run to learn the account tier.
pub const PROBE_QUERY: &str = "Kendall Sq, Cambridge, MA";

/// Daily request limit reported for free trial accounts.
pub const FREE_TRIAL_LIMIT: u64 = 2500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountTier {
    FreeTrial,
    Paid,
    /// The probe response carried no rate limit information.
    Unknown,
}

/// Sends the probe request. Any failure is returned as `ProbeFailed`.
pub async fn probe_account(geocoder: &dyn Geocoder, params: &ApiParams) -> Result<AccountTier> {
    let set = geocoder
        .forward(PROBE_QUERY, params)
        .await
        .map_err(|source| PipelineError::ProbeFailed { source })?;

    let tier = match set.rate.and_then(|rate| rate.limit) {
        Some(FREE_TRIAL_LIMIT) => AccountTier::FreeTrial,
        Some(_) => AccountTier::Paid,
        None => AccountTier::Unknown,
    };
    debug!(?tier, rate = ?set.rate, "Probe request succeeded");
    Ok(tier)
}

/// What a finished run did.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub rows_read: u64,
    pub rows_written: u64,
    pub rows_found: u64,
    pub rows_not_found: u64,
    /// Rows whose request ended in an error. Included in `rows_not_found`.
    pub rows_failed: u64,
    pub warnings: u64,
    pub workers: usize,
    pub dry_run: bool,
    pub elapsed: Duration,
}

/// Runs one batch: probe, read, geocode, write.
pub struct BatchExecutor {
    options: BatchOptions,
    geocoder: Arc<dyn Geocoder>,
}

impl BatchExecutor {
    pub fn new(options: BatchOptions, geocoder: Arc<dyn Geocoder>) -> Self {
        BatchExecutor { options, geocoder }
    }

    /// Worker count after the account tier is known.
    pub async fn effective_workers(&self) -> Result<usize> {
        let tier = probe_account(self.geocoder.as_ref(), &self.options.api_params).await?;
        if tier == AccountTier::FreeTrial && self.options.workers > 1 {
            warn!("Free trial account detected. Resetting number of workers to 1.");
            return Ok(1);
        }
        Ok(self.options.workers)
    }

    /// Geocodes every row of `input`. `open_sink` is only called once the input has
    /// been read and never in dry-run mode.
    #[instrument(skip_all, fields(command = %self.options.command))]
    pub async fn run<R, S, F>(&self, input: R, open_sink: F) -> Result<BatchSummary>
    where
        R: BufRead,
        S: BaseWriter + Send + 'static,
        F: FnOnce() -> Result<S>,
    {
        let started = Instant::now();
        let options = &self.options;
        options.validate()?;

        let workers = if options.dry_run {
            options.workers
        } else {
            self.effective_workers().await?
        };

        let mut reader = LineReader::new(
            input,
            LineReaderConfig::with_columns(options.command, options.input_columns.clone()),
        );
        let header = if options.headers {
            reader.read_header()?
        } else {
            None
        };

        let queue: Arc<WorkQueue<WorkItem>> = Arc::new(WorkQueue::new(options.limit));
        let read = populate_queue(&mut reader, &queue).await?;
        drop(reader);

        if options.dry_run {
            let summary = BatchSummary {
                rows_read: read.rows,
                rows_written: 0,
                rows_found: 0,
                rows_not_found: 0,
                rows_failed: 0,
                warnings: read.warnings,
                workers,
                dry_run: true,
                elapsed: started.elapsed(),
            };
            info!(rows = summary.rows_read, warnings = summary.warnings, "Dry run finished");
            return Ok(summary);
        }

        let sequencer = Arc::new(OutputSequencer::new(
            open_sink()?,
            options.add_columns.clone(),
            options.field_lookup.clone(),
            options.order,
        ));
        if let Some(header) = &header {
            sequencer.write_header(header).await?;
        }

        let progress = ProgressReporter::new(read.rows, options.show_progress);
        let stats = Arc::new(WorkerStats::default());
        let ctx = WorkerContext {
            queue: Arc::clone(&queue),
            geocoder: Arc::clone(&self.geocoder),
            retry: RetryPolicy::new(options.retry.clone()),
            command: options.command,
            api_params: Arc::new(options.api_params.clone()),
            sequencer: Arc::clone(&sequencer),
            progress: progress.clone(),
            fatal: Arc::new(Mutex::new(None)),
            stats: Arc::clone(&stats),
            verbose: options.verbose,
        };

        info!(workers, rows = read.rows, "Starting workers");
        let mut running: FuturesUnordered<_> = spawn_workers(&ctx, workers).into_iter().collect();

        let drained = tokio::select! {
            _ = queue.join() => Ok(()),
            Some(joined) = running.next() => Err(match joined {
                Err(e) if e.is_panic() => {
                    PipelineError::WorkerError("a worker panicked while processing a row".to_string())
                }
                _ => PipelineError::WorkerError(
                    "a worker stopped before the input was processed".to_string(),
                ),
            }),
        };

        for handle in running.iter() {
            handle.abort();
        }
        while let Some(joined) = running.next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    warn!("Worker panicked during shutdown");
                }
            }
        }
        progress.finish();

        let fatal = ctx.take_fatal();
        drop(ctx);
        drained?;
        if let Some(err) = fatal {
            return Err(err);
        }

        let sequencer = Arc::try_unwrap(sequencer).map_err(|_| {
            PipelineError::Unexpected("output is still referenced after shutdown".to_string())
        })?;
        let (sink, written) = sequencer.into_sink()?;
        sink.close()?;

        let summary = BatchSummary {
            rows_read: read.rows,
            rows_written: written as u64,
            rows_found: stats.found(),
            rows_not_found: stats.not_found(),
            rows_failed: stats.failed(),
            warnings: read.warnings,
            workers,
            dry_run: false,
            elapsed: started.elapsed(),
        };
        info!(
            rows_read = summary.rows_read,
            rows_written = summary.rows_written,
            not_found = summary.rows_not_found,
            failed = summary.rows_failed,
            warnings = summary.warnings,
            workers = summary.workers,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Batch finished"
        );
        Ok(summary)
    }
}
