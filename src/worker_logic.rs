// src/worker_logic.rs

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::data_model::{Command, GeocodeResult, WorkItem};
use crate::error::{PipelineError, Result};
use crate::geocoder::{ApiParams, Geocoder};
use crate::pipeline::writers::BaseWriter;
use crate::pipeline::{OutputSequencer, ProgressReporter, RetryPolicy, WorkQueue};
use crate::utils::prometheus_metrics::*;

/// Outcome counters shared by all workers of one run.
#[derive(Debug, Default)]
pub struct WorkerStats {
    found: AtomicU64,
    not_found: AtomicU64,
    failed: AtomicU64,
}

impl WorkerStats {
    pub fn found(&self) -> u64 {
        self.found.load(Ordering::Relaxed)
    }

    pub fn not_found(&self) -> u64 {
        self.not_found.load(Ordering::Relaxed)
    }

    /// Rows whose request ended in an error (they are also counted as not found).
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Everything a worker task needs. Cheap to clone, one clone per worker.
pub struct WorkerContext<S: BaseWriter> {
    pub queue: Arc<WorkQueue<WorkItem>>,
    pub geocoder: Arc<dyn Geocoder>,
    pub retry: RetryPolicy,
    pub command: Command,
    pub api_params: Arc<ApiParams>,
    pub sequencer: Arc<OutputSequencer<S>>,
    pub progress: ProgressReporter,
    pub fatal: Arc<Mutex<Option<PipelineError>>>,
    pub stats: Arc<WorkerStats>,
    pub verbose: bool,
}

impl<S: BaseWriter> Clone for WorkerContext<S> {
    fn clone(&self) -> Self {
        WorkerContext {
            queue: Arc::clone(&self.queue),
            geocoder: Arc::clone(&self.geocoder),
            retry: self.retry.clone(),
            command: self.command,
            api_params: Arc::clone(&self.api_params),
            sequencer: Arc::clone(&self.sequencer),
            progress: self.progress.clone(),
            fatal: Arc::clone(&self.fatal),
            stats: Arc::clone(&self.stats),
            verbose: self.verbose,
        }
    }
}

impl<S: BaseWriter> WorkerContext<S> {
    /// Keeps the first fatal error; later ones are only logged.
    fn record_fatal(&self, err: PipelineError) {
        let mut slot = self.fatal.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            error!(error = %err, "Writing results failed, the run will stop after draining the queue");
            *slot = Some(err);
        } else {
            debug!(error = %err, "Additional write failure");
        }
    }

    pub fn take_fatal(&self) -> Option<PipelineError> {
        self.fatal.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

/// Spawns `count` workers on the current runtime.
pub fn spawn_workers<S>(ctx: &WorkerContext<S>, count: usize) -> Vec<JoinHandle<()>>
where
    S: BaseWriter + Send + 'static,
{
    (1..=count)
        .map(|worker_id| tokio::spawn(run_worker(worker_id, ctx.clone())))
        .collect()
}

/// Pulls items until the task is aborted.
#[instrument(skip(ctx))]
pub async fn run_worker<S: BaseWriter>(worker_id: usize, ctx: WorkerContext<S>) {
    debug!("Worker started");
    loop {
        let item = ctx.queue.get().await;
        ACTIVE_WORKERS.inc();

        if let Err(e) = process_item(&ctx, item).await {
            ctx.record_fatal(e);
        }
        ctx.progress.advance();

        ACTIVE_WORKERS.dec();
        ctx.queue.task_done();
    }
}

/// Geocodes one item and hands the row to the sequencer.
///
/// Only sink failures come back as errors; request failures become not-found rows.
pub async fn process_item<S: BaseWriter>(ctx: &WorkerContext<S>, item: WorkItem) -> Result<()> {
    let WorkItem {
        row_id,
        query,
        original_fields,
        ..
    } = item;

    let result = geocode_item(ctx, row_id, &query).await;
    if result.found() {
        ctx.stats.found.fetch_add(1, Ordering::Relaxed);
    } else {
        ctx.stats.not_found.fetch_add(1, Ordering::Relaxed);
        ROWS_NOT_FOUND_TOTAL.inc();
    }

    let written = ctx.sequencer.submit(row_id, &result, original_fields).await?;
    ROWS_WRITTEN_TOTAL.inc_by(written as f64);
    Ok(())
}

/// Runs the retry-wrapped request for one row. Never fails: errors are logged and
/// turned into not found.
pub async fn geocode_item<S: BaseWriter>(
    ctx: &WorkerContext<S>,
    row_id: u64,
    query: &str,
) -> GeocodeResult {
    if query.is_empty() {
        debug!(row_id, "Skipping request for a row without a query");
        return GeocodeResult::not_found();
    }

    if ctx.verbose {
        info!(
            row_id,
            request = %ctx.geocoder.describe_request(query, &ctx.api_params),
            "Sending request"
        );
    }

    let coordinates = match ctx.command {
        Command::Reverse => query.split_once(','),
        Command::Forward => None,
    };
    let geocoder = &ctx.geocoder;
    let params = ctx.api_params.as_ref();

    let timer = REQUEST_DURATION_SECONDS.start_timer();
    let outcome = ctx
        .retry
        .run(
            |_attempt| {
                GEOCODE_REQUESTS_TOTAL.inc();
                async move {
                    match coordinates {
                        Some((lat, lng)) => geocoder.reverse(lat, lng, params).await,
                        None => geocoder.forward(query, params).await,
                    }
                }
            },
            |event| {
                GEOCODE_RETRIES_TOTAL.inc();
                warn!(
                    row_id,
                    attempt = event.attempt,
                    delay_ms = event.delay.as_millis() as u64,
                    elapsed_ms = event.elapsed.as_millis() as u64,
                    "Request timed out, backing off"
                );
            },
        )
        .await;
    timer.observe_duration();

    match outcome {
        Ok(set) => {
            if ctx.verbose {
                info!(row_id, results = set.len(), rate = ?set.rate, "Received response");
            }
            GeocodeResult::from_record(set.results.into_iter().next())
        }
        Err(e) => {
            GEOCODE_FAILURES_TOTAL.with_label_values(&[e.kind()]).inc();
            ctx.stats.failed.fetch_add(1, Ordering::Relaxed);
            warn!("Line {} - Failed to geocode '{}': {}", row_id, query, e);
            GeocodeResult::not_found()
        }
    }
}
