//! Bounded worker pool for template transformation.
//!
//! The pool decouples "how many template sources exist" from "how many
//! transformations run concurrently". Submission queues work items; the
//! workers (one per logical core by default) are started lazily by
//! [`TransformPool::complete`] and drain the queue until it is exhausted.
//! Each item resolves its slot exactly once, either with a generated
//! source, with failure diagnostics, or as cancelled.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, mpsc};
use std::thread::JoinHandle;

use eyre::{Result, eyre};
use kiln_core::{Diagnostic, DiagnosticSink, GeneratedSource};

use crate::cache::ContentCache;
use crate::cancel::CancelToken;
use crate::transform::Transformer;

/// The resolution of one queued transformation request.
#[derive(Debug, Default)]
pub struct TransformOutcome {
    /// Present when transformation (or a cache hit) produced source text.
    pub generated: Option<GeneratedSource>,
    /// Per-item diagnostics, folded into the sink by the loader.
    pub diagnostics: Vec<Diagnostic>,
    /// The item was resolved as cancelled without running the transformer.
    pub cancelled: bool,
}

/// A pre-indexed result slot, written exactly once by one worker.
pub type ResultSlot = Arc<OnceLock<TransformOutcome>>;

struct WorkItem {
    origin: PathBuf,
    text: String,
    slot: ResultSlot,
}

/// A bounded set of workers draining a shared transformation queue.
pub struct TransformPool {
    transformer: Arc<Transformer>,
    cache: Arc<ContentCache>,
    sink: DiagnosticSink,
    cancel: CancelToken,
    tx: mpsc::Sender<WorkItem>,
    rx: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
    size: usize,
    submitted: AtomicUsize,
}

impl TransformPool {
    /// A pool sized to available parallelism.
    pub fn new(
        transformer: Arc<Transformer>,
        cache: Arc<ContentCache>,
        sink: DiagnosticSink,
        cancel: CancelToken,
    ) -> Self {
        let size = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1);
        Self::with_size(transformer, cache, sink, cancel, size)
    }

    /// A pool with an explicit worker count.
    pub fn with_size(
        transformer: Arc<Transformer>,
        cache: Arc<ContentCache>,
        sink: DiagnosticSink,
        cancel: CancelToken,
        size: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            transformer,
            cache,
            sink,
            cancel,
            tx,
            rx: Arc::new(Mutex::new(rx)),
            size: size.max(1),
            submitted: AtomicUsize::new(0),
        }
    }

    /// The cancellation token shared by all workers.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Number of items submitted so far.
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    /// Queue one transformation request and return its result slot.
    pub fn submit(&self, origin: PathBuf, text: String) -> ResultSlot {
        let slot: ResultSlot = Arc::new(OnceLock::new());
        self.submitted.fetch_add(1, Ordering::SeqCst);
        self.tx
            .send(WorkItem {
                origin,
                text,
                slot: slot.clone(),
            })
            .expect("transform queue receiver alive until complete()");
        slot
    }

    /// Signal that no more items will be added, run the workers, and wait
    /// until every submitted item has been resolved.
    ///
    /// This is the single synchronization point the loader awaits before
    /// assembling the compilation unit.
    pub fn complete(self) -> Result<()> {
        let Self {
            transformer,
            cache,
            sink,
            cancel,
            tx,
            rx,
            size,
            submitted,
        } = self;
        // Close the queue; workers exit once it is drained.
        drop(tx);

        if submitted.into_inner() == 0 {
            return Ok(());
        }

        let workers: Vec<JoinHandle<()>> = (0..size)
            .map(|_| {
                let transformer = transformer.clone();
                let cache = cache.clone();
                let sink = sink.clone();
                let cancel = cancel.clone();
                let rx = rx.clone();
                std::thread::spawn(move || {
                    worker_loop(&transformer, &cache, &sink, &cancel, &rx);
                })
            })
            .collect();

        for worker in workers {
            worker
                .join()
                .map_err(|_| eyre!("transform worker panicked"))?;
        }
        Ok(())
    }
}

fn worker_loop(
    transformer: &Transformer,
    cache: &ContentCache,
    sink: &DiagnosticSink,
    cancel: &CancelToken,
    rx: &Mutex<mpsc::Receiver<WorkItem>>,
) {
    loop {
        // The queue is already closed when workers start, so recv never
        // blocks; holding the lock across it is harmless.
        let item = match rx.lock().unwrap().recv() {
            Ok(item) => item,
            Err(_) => return,
        };

        let outcome = if cancel.is_cancelled() {
            TransformOutcome {
                cancelled: true,
                ..TransformOutcome::default()
            }
        } else {
            process(transformer, cache, sink, cancel, &item)
        };

        // Each index is written by exactly one worker.
        let _ = item.slot.set(outcome);
    }
}

fn process(
    transformer: &Transformer,
    cache: &ContentCache,
    sink: &DiagnosticSink,
    cancel: &CancelToken,
    item: &WorkItem,
) -> TransformOutcome {
    let key = transformer.cache_key(&item.origin, &item.text);
    if let Some(text) = cache.get(&key) {
        // Hit: the transformer is skipped entirely.
        return TransformOutcome {
            generated: Some(GeneratedSource {
                origin: item.origin.clone(),
                text,
                key,
            }),
            diagnostics: Vec::new(),
            cancelled: false,
        };
    }

    let output = transformer.transform(&item.origin, &item.text, cancel);
    if let Some(generated) = &output.generated {
        cache.put(&generated.key, &generated.text, &generated.origin, sink);
    }
    TransformOutcome {
        generated: output.generated,
        diagnostics: output.diagnostics,
        cancelled: false,
    }
}
