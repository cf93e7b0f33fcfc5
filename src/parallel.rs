//! Ordered, bounded batch pipeline
//!
//! Batches move through three stages:
//!
//! 1. **intake** (one thread): fills pooled batches from a [`ChunkedReader`]
//! 2. **transform** (N threads): runs a [`ParallelProcessor`] on each batch
//! 3. **drain** (calling thread): hands batches and their outputs to an
//!    [`OrderedSink`] strictly in input order
//!
//! The number of batches in flight is bounded by the pool size (the token budget),
//! so a slow drain stalls intake instead of buffering without limit.

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::channel::bounded;

use crate::error::ProcessingError;
use crate::io::ChunkedReader;
use crate::pool::{BatchPool, PooledBatch};
use crate::{ProcessingConfig, RecordBatch, Result};

/// Trait for types that transform batches in parallel.
///
/// This is implemented by the **processor**. Each worker thread receives its own
/// clone, so per-thread scratch state can live in the processor itself.
pub trait ParallelProcessor: Send + Clone {
    /// Result handed to the drain stage along with the batch
    type Output: Send;

    /// Process a single batch
    fn process_batch(&mut self, batch: &mut RecordBatch) -> Result<Self::Output>;

    /// Set the thread ID for this processor
    ///
    /// Each thread calls this method with its own unique ID.
    #[allow(unused_variables)]
    fn set_tid(&mut self, tid: usize) {
        // Default implementation does nothing
    }

    /// Get the thread ID for this processor
    fn get_tid(&self) -> Option<usize> {
        None
    }
}

/// Trait for the serial, ordered consumer of processed batches.
pub trait OrderedSink<O> {
    /// Consume one batch and the output computed for it
    fn drain(&mut self, batch: &RecordBatch, output: O) -> Result<()>;
}

/// Drives a reader, a processor, and a sink through the three-stage pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderedPipeline {
    /// Transform workers
    threads: usize,
    /// Batches allowed in flight at once
    tokens: usize,
    /// Records per batch
    batch_size: usize,
    /// Bytes reserved per pooled batch
    batch_capacity_bytes: usize,
}
impl OrderedPipeline {
    #[must_use]
    pub fn new(config: &ProcessingConfig) -> Self {
        Self {
            threads: config.resolved_threads(),
            tokens: config.token_budget(),
            batch_size: config.batch_size,
            batch_capacity_bytes: config.batch_capacity_bytes,
        }
    }

    #[must_use]
    pub fn threads(&self) -> usize {
        self.threads
    }

    #[must_use]
    pub fn tokens(&self) -> usize {
        self.tokens
    }

    /// Runs the pipeline to completion, returning the number of batches drained
    ///
    /// With one thread the stages run back to back on the calling thread. Any error
    /// in any stage stops intake, discards batches still in flight, and is returned.
    pub fn run<R, P, S>(
        &self,
        reader: &mut ChunkedReader<R>,
        processor: P,
        sink: &mut S,
    ) -> Result<usize>
    where
        R: Read + Send,
        P: ParallelProcessor,
        S: OrderedSink<P::Output>,
    {
        if self.threads <= 1 {
            self.run_sequential(reader, processor, sink)
        } else {
            self.run_parallel(reader, processor, sink)
        }
    }

    fn run_sequential<R, P, S>(
        &self,
        reader: &mut ChunkedReader<R>,
        mut processor: P,
        sink: &mut S,
    ) -> Result<usize>
    where
        R: Read,
        P: ParallelProcessor,
        S: OrderedSink<P::Output>,
    {
        log::debug!("Running pipeline on the calling thread");
        processor.set_tid(0);
        let mut batch = RecordBatch::with_capacity(self.batch_capacity_bytes, self.batch_size);
        let mut n_batches = 0;
        while reader.fill_batch(&mut batch, self.batch_size)? {
            let output = processor.process_batch(&mut batch)?;
            sink.drain(&batch, output)?;
            n_batches += 1;
        }
        Ok(n_batches)
    }

    fn run_parallel<R, P, S>(
        &self,
        reader: &mut ChunkedReader<R>,
        processor: P,
        sink: &mut S,
    ) -> Result<usize>
    where
        R: Read + Send,
        P: ParallelProcessor,
        S: OrderedSink<P::Output>,
    {
        log::debug!(
            "Running pipeline with {} workers and {} in-flight batches",
            self.threads,
            self.tokens
        );
        let pool = BatchPool::with_batch_capacity(
            self.tokens,
            self.tokens,
            self.batch_capacity_bytes,
            self.batch_size,
        );
        let abort = AtomicBool::new(false);
        let (work_tx, work_rx) = bounded::<(usize, PooledBatch)>(self.tokens);
        let (done_tx, done_rx) =
            bounded::<(usize, PooledBatch, Result<P::Output>)>(self.tokens);
        let batch_size = self.batch_size;

        std::thread::scope(|scope| -> Result<usize> {
            let pool = &pool;
            let abort = &abort;

            // Stage 1: serial intake
            let intake = scope.spawn(move || -> Result<usize> {
                let mut seq = 0;
                while !abort.load(Ordering::Acquire) {
                    let mut batch = pool.acquire();
                    match reader.fill_batch(&mut batch, batch_size) {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => {
                            abort.store(true, Ordering::Release);
                            return Err(e);
                        }
                    }
                    if work_tx.send((seq, batch)).is_err() {
                        break;
                    }
                    seq += 1;
                }
                Ok(seq)
            });

            // Stage 2: parallel transform
            let workers: Vec<_> = (0..self.threads)
                .map(|tid| {
                    let work_rx = work_rx.clone();
                    let done_tx = done_tx.clone();
                    let mut proc = processor.clone();
                    proc.set_tid(tid);
                    scope.spawn(move || {
                        for (seq, mut batch) in &work_rx {
                            let _guard = AbortOnPanic(abort);
                            // Drop the batch back into the pool once the run is doomed
                            if abort.load(Ordering::Acquire) {
                                continue;
                            }
                            let output = proc.process_batch(&mut batch);
                            if output.is_err() {
                                abort.store(true, Ordering::Release);
                            }
                            if done_tx.send((seq, batch, output)).is_err() {
                                break;
                            }
                        }
                    })
                })
                .collect();
            drop(work_rx);
            drop(done_tx);

            // Stage 3: serial ordered drain
            let mut pending = BTreeMap::new();
            let mut next = 0;
            let mut first_error = None;
            for (seq, batch, output) in &done_rx {
                if first_error.is_some() {
                    continue;
                }
                // Batches before a failed one may never arrive once workers abort
                let output = match output {
                    Ok(output) => output,
                    Err(e) => {
                        first_error = Some(e);
                        pending.clear();
                        continue;
                    }
                };
                pending.insert(seq, (batch, output));
                while let Some((batch, output)) = pending.remove(&next) {
                    next += 1;
                    if let Err(e) = sink.drain(&batch, output) {
                        abort.store(true, Ordering::Release);
                        first_error = Some(e);
                        pending.clear();
                        break;
                    }
                }
            }

            let intake_result = intake
                .join()
                .map_err(|_| ProcessingError::WorkerPanic("intake"))?;
            let worker_panicked = workers
                .into_iter()
                .fold(false, |panicked, handle| handle.join().is_err() || panicked);

            if let Some(e) = first_error {
                return Err(e);
            }
            let n_batches = intake_result?;
            if worker_panicked {
                return Err(ProcessingError::WorkerPanic("transform").into());
            }
            if next != n_batches {
                return Err(ProcessingError::Disconnected("drain").into());
            }
            Ok(n_batches)
        })
    }
}

/// Raises the abort flag if a worker unwinds while holding a batch
///
/// Declared after the batch so it drops first, before the batch wakes the intake.
struct AbortOnPanic<'a>(&'a AtomicBool);
impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.store(true, Ordering::Release);
        }
    }
}
