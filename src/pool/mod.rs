pub(crate) mod worker;

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread::JoinHandle;

use anyhow::Context as _;
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};

use crate::foundation::error::{LoopforgeError, LoopforgeResult};

pub(crate) use worker::{FrameTask, ProcessedStill};

/// A frame that finished raster processing, ready for the encoder.
#[derive(Clone, Debug)]
pub(crate) struct ProcessedFrame {
    /// 0-based position in the decimated sequence.
    pub(crate) index: u32,
    /// Lossless PNG of the processed bitmap.
    pub(crate) png: Vec<u8>,
    /// Time until the next frame, in milliseconds.
    pub(crate) delay_ms: u32,
}

/// Envelope posted to a worker's message port.
pub(crate) enum WorkerRequest {
    /// Process one frame and answer on `reply`.
    Process {
        task: FrameTask,
        reply: Sender<LoopforgeResult<ProcessedStill>>,
    },
    /// Drain nothing further and exit the thread.
    Shutdown,
}

struct WorkerSlot {
    tx: Sender<WorkerRequest>,
    handle: Option<JoinHandle<()>>,
    dispatched: AtomicU64,
}

/// Fixed set of raster worker threads dispatched round-robin.
///
/// Ports are crossbeam channels, so the pool can be shared across threads
/// (`&WorkerPool` submits concurrently). Each submission installs its own
/// reply channel, so replies correlate to submissions structurally; the
/// reply's echoed `frame_index` is verified on top of that.
pub(crate) struct WorkerPool {
    workers: Vec<WorkerSlot>,
    next: AtomicUsize,
    down: AtomicBool,
}

/// Pool size used when the caller does not pick one.
pub(crate) fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| (n.get() / 2).max(2))
        .unwrap_or(2)
}

impl WorkerPool {
    /// Spawn `size` workers (clamped to at least one).
    pub(crate) fn new(size: usize) -> LoopforgeResult<Self> {
        let size = size.max(1);
        let mut workers = Vec::with_capacity(size);
        for i in 0..size {
            let (tx, rx) = unbounded();
            let handle = std::thread::Builder::new()
                .name(format!("loopforge-worker-{i}"))
                .spawn(move || worker::worker_main(rx))
                .with_context(|| format!("failed to spawn raster worker {i}"))?;
            workers.push(WorkerSlot {
                tx,
                handle: Some(handle),
                dispatched: AtomicU64::new(0),
            });
        }
        Ok(Self {
            workers,
            next: AtomicUsize::new(0),
            down: AtomicBool::new(false),
        })
    }

    /// Post a task to the next worker in rotation.
    ///
    /// `delay_ms` rides alongside the contract payload so the caller gets a
    /// complete [`ProcessedFrame`] back from [`PendingFrame::wait`].
    pub(crate) fn submit(&self, task: FrameTask, delay_ms: u32) -> LoopforgeResult<PendingFrame> {
        if self.down.load(Ordering::Acquire) {
            return Err(LoopforgeError::pool_shutdown(
                "task submitted after pool termination",
            ));
        }

        let slot = &self.workers[self.next.fetch_add(1, Ordering::Relaxed) % self.workers.len()];
        let frame_index = task.frame_index;
        let (reply_tx, reply_rx) = bounded(1);
        slot.tx
            .send(WorkerRequest::Process {
                task,
                reply: reply_tx,
            })
            .map_err(|_| LoopforgeError::pool_shutdown("worker port is closed"))?;
        slot.dispatched.fetch_add(1, Ordering::Relaxed);

        Ok(PendingFrame {
            reply: reply_rx,
            frame_index,
            delay_ms,
        })
    }

    /// Per-worker dispatch ledger, in worker order.
    pub(crate) fn dispatch_counts(&self) -> Vec<u64> {
        self.workers
            .iter()
            .map(|w| w.dispatched.load(Ordering::Relaxed))
            .collect()
    }

    /// Post shutdown to every worker and join them. Idempotent; pending
    /// tasks fail with `pool-shutdown`.
    pub(crate) fn shutdown(&mut self) {
        if self.down.swap(true, Ordering::AcqRel) {
            return;
        }
        for slot in &self.workers {
            let _ = slot.tx.send(WorkerRequest::Shutdown);
        }
        for slot in &mut self.workers {
            if let Some(handle) = slot.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Handle to one in-flight worker task.
#[derive(Debug)]
pub(crate) struct PendingFrame {
    reply: Receiver<LoopforgeResult<ProcessedStill>>,
    frame_index: u32,
    delay_ms: u32,
}

impl PendingFrame {
    /// Block until the worker answers.
    pub(crate) fn wait(self) -> LoopforgeResult<ProcessedFrame> {
        let result = self.reply.recv().map_err(|_| {
            LoopforgeError::pool_shutdown("worker terminated before replying")
        })?;
        let still = result?;
        if still.frame_index != self.frame_index {
            return Err(anyhow::anyhow!(
                "worker reply for frame {} does not match submission {}",
                still.frame_index,
                self.frame_index
            )
            .into());
        }
        Ok(ProcessedFrame {
            index: still.frame_index,
            png: still.png,
            delay_ms: self.delay_ms,
        })
    }
}
