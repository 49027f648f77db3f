//! Releasing what dead strikes leave behind
//!
//! A strike's destructor cannot free its images and scaler context on the
//! spot: it may be running on a render thread, or while some other part of
//! the cache holds a lock. Instead it packs everything into a
//! [`DisposalRecord`] and hands it to the [`Disposer`], which frees images,
//! then the scaler context, then removes the strike's registry entry.
//!
//! The entry is removed only if it still names the dead strike. A new strike
//! published under the same key in the meantime keeps its entry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use glyphstrike_core::{DisposalMode, Scaler, ScalerContext, StrikeKey};

use crate::arena::{GlyphImageArena, GlyphImageHandle};
use crate::font::Font2D;
use crate::strike::StrikeId;

/// Everything a dead strike still owns
pub(crate) struct DisposalRecord {
    pub font: Weak<Font2D>,
    pub key: StrikeKey,
    pub id: StrikeId,
    pub images: Vec<GlyphImageHandle>,
    /// The context together with the scaler that created it
    pub context: Option<(Arc<dyn Scaler>, ScalerContext)>,
}

impl DisposalRecord {
    fn dispose(self, arena: &GlyphImageArena) {
        let freed = arena.free(self.images);
        if let Some((scaler, context)) = self.context {
            scaler.free_context(context);
        }
        let removed = match self.font.upgrade() {
            Some(font) => font.forget_strike(&self.key, self.id),
            None => false,
        };
        log::trace!(
            "Disposed strike {:?}: {} images freed, registry entry {}",
            self.id,
            freed,
            if removed { "removed" } else { "kept" }
        );
    }
}

enum Message {
    Dispose(DisposalRecord),
    Flush(Sender<()>),
}

/// Queue and worker for disposal records
pub(crate) struct Disposer {
    mode: DisposalMode,
    arena: Arc<GlyphImageArena>,
    sender: Option<Sender<Message>>,
    receiver: Receiver<Message>,
    worker: Option<JoinHandle<()>>,
    disposed: Arc<AtomicU64>,
}

impl Disposer {
    pub fn new(mode: DisposalMode, arena: Arc<GlyphImageArena>) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let disposed = Arc::new(AtomicU64::new(0));

        let mut worker = None;
        let mut mode = mode;
        if mode == DisposalMode::Background {
            let rx = receiver.clone();
            let worker_arena = Arc::clone(&arena);
            let counter = Arc::clone(&disposed);
            let spawned = thread::Builder::new()
                .name("glyphstrike-disposer".into())
                .spawn(move || {
                    for message in rx.iter() {
                        match message {
                            Message::Dispose(record) => {
                                record.dispose(&worker_arena);
                                counter.fetch_add(1, Ordering::Relaxed);
                            }
                            Message::Flush(ack) => {
                                let _ = ack.send(());
                            }
                        }
                    }
                    log::debug!("Disposer thread exiting");
                });
            match spawned {
                Ok(handle) => worker = Some(handle),
                Err(err) => {
                    log::warn!("Could not start disposer thread ({}); disposing inline", err);
                    mode = DisposalMode::Inline;
                }
            }
        }

        Self {
            mode,
            arena,
            sender: Some(sender),
            receiver,
            worker,
            disposed,
        }
    }

    pub fn mode(&self) -> DisposalMode {
        self.mode
    }

    /// Accept a record from a dying strike
    pub fn submit(&self, record: DisposalRecord) {
        if self.mode == DisposalMode::Inline {
            self.run(record);
            return;
        }
        let Some(sender) = &self.sender else {
            self.run(record);
            return;
        };
        if let Err(crossbeam_channel::SendError(Message::Dispose(record))) =
            sender.send(Message::Dispose(record))
        {
            self.run(record);
        }
    }

    /// Process queued records on the calling thread
    pub fn drain(&self) -> usize {
        let mut count = 0;
        for message in self.receiver.try_iter() {
            match message {
                Message::Dispose(record) => {
                    self.run(record);
                    count += 1;
                }
                Message::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }
        count
    }

    /// Wait until every record submitted so far has been processed
    pub fn flush(&self) {
        match self.mode {
            DisposalMode::Inline => {}
            DisposalMode::Deferred => {
                self.drain();
            }
            DisposalMode::Background => {
                let Some(sender) = &self.sender else {
                    return;
                };
                let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
                if sender.send(Message::Flush(ack_tx)).is_ok() {
                    let _ = ack_rx.recv();
                }
            }
        }
    }

    /// Records waiting in the queue
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Records processed so far
    pub fn disposed(&self) -> u64 {
        self.disposed.load(Ordering::Relaxed)
    }

    fn run(&self, record: DisposalRecord) {
        record.dispose(&self.arena);
        self.disposed.fetch_add(1, Ordering::Relaxed);
    }
}

impl Drop for Disposer {
    fn drop(&mut self) {
        if self.mode != DisposalMode::Background {
            self.drain();
        }
        // Closing the channel ends the worker loop
        self.sender = None;
        if let Some(worker) = self.worker.take() {
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                log::error!("Disposer thread panicked");
            }
        }
    }
}
