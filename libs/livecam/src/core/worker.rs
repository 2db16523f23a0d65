// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Single-worker FIFO task queues.
//!
//! Every session owns one [`SerialQueue`]: items are handled strictly in
//! submission order on one named thread, so per-stream state needs no lock.
//! Submitting never blocks the caller except under
//! [`OverflowPolicy::Block`], and then only up to its timeout.
//!
//! Items marked as control (flush markers) are never lost to `DropOldest`:
//! an evicted control item moves to a side channel the worker serves before
//! the next regular item.

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, TrySendError};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::core::config::{OverflowPolicy, QueueConfig};
use crate::core::{Result, StreamError};

pub struct SerialQueue<T: Send + 'static> {
    name: String,
    overflow: OverflowPolicy,
    sender: Option<Sender<T>>,
    /// Second handle on the receiving side, used to evict under `DropOldest`.
    evictor: Option<Receiver<T>>,
    /// Control items taken out by the evictor, handled ahead of newer items.
    rescued: Option<Sender<T>>,
    is_control: fn(&T) -> bool,
    dropped: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> SerialQueue<T> {
    /// Spawn the worker thread. `handler` runs once per item, in order.
    pub fn spawn<F>(name: impl Into<String>, config: QueueConfig, handler: F) -> Result<Self>
    where
        F: FnMut(T) + Send + 'static,
    {
        Self::spawn_with_control(name, config, |_| false, handler)
    }

    /// Like [`spawn`](Self::spawn), with items for which `is_control` holds
    /// exempt from eviction.
    pub fn spawn_with_control<F>(
        name: impl Into<String>,
        config: QueueConfig,
        is_control: fn(&T) -> bool,
        mut handler: F,
    ) -> Result<Self>
    where
        F: FnMut(T) + Send + 'static,
    {
        let name = name.into();
        config.validate(&name)?;

        let (sender, receiver) = match config.capacity {
            Some(capacity) => crossbeam_channel::bounded(capacity),
            None => crossbeam_channel::unbounded(),
        };
        let (rescued_tx, rescued_rx) = crossbeam_channel::unbounded::<T>();
        let evictor = (config.overflow == OverflowPolicy::DropOldest).then(|| receiver.clone());

        let worker_name = name.clone();
        let thread = std::thread::Builder::new()
            .name(format!("livecam-{}", name))
            .spawn(move || {
                tracing::trace!("[SerialQueue:{}] Worker started", worker_name);
                loop {
                    for item in rescued_rx.try_iter() {
                        handler(item);
                    }
                    // `None` once the submitting side is gone and drained.
                    let next: Option<Option<T>> = crossbeam_channel::select! {
                        recv(receiver) -> item => item.ok().map(Some),
                        recv(rescued_rx) -> item => Some(item.ok()),
                    };
                    match next {
                        Some(Some(item)) => handler(item),
                        Some(None) => {}
                        None => break,
                    }
                }
                for item in rescued_rx.try_iter() {
                    handler(item);
                }
                tracing::trace!("[SerialQueue:{}] Worker drained", worker_name);
            })
            .map_err(|e| StreamError::Runtime(format!("Failed to spawn thread: {}", e)))?;

        Ok(Self {
            name,
            overflow: config.overflow,
            sender: Some(sender),
            evictor,
            rescued: Some(rescued_tx),
            is_control,
            dropped: Arc::new(AtomicU64::new(0)),
            thread: Some(thread),
        })
    }

    /// Enqueue one item.
    ///
    /// Under `DropOldest` the new item is always accepted and the eviction is
    /// only counted; the other policies return `QueueFull` for the rejected
    /// item. A control item waits for a free slot instead of being rejected.
    pub fn submit(&self, item: T) -> Result<()> {
        let sender = self.sender.as_ref().ok_or_else(|| {
            StreamError::SessionUnavailable(format!("Queue '{}' is shut down", self.name))
        })?;

        if (self.is_control)(&item) && self.overflow != OverflowPolicy::DropOldest {
            return sender.send(item).map_err(|_| self.disconnected());
        }

        match self.overflow {
            OverflowPolicy::DropNewest => match sender.try_send(item) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => Err(self.reject()),
                Err(TrySendError::Disconnected(_)) => Err(self.disconnected()),
            },
            OverflowPolicy::DropOldest => {
                let mut item = item;
                loop {
                    match sender.try_send(item) {
                        Ok(()) => return Ok(()),
                        Err(TrySendError::Full(back)) => {
                            item = back;
                            // The worker may have freed the slot first; then the
                            // retry succeeds without evicting.
                            let evicted = self.evictor.as_ref().and_then(|e| e.try_recv().ok());
                            if let Some(evicted) = evicted {
                                self.evict(evicted);
                            }
                        }
                        Err(TrySendError::Disconnected(_)) => return Err(self.disconnected()),
                    }
                }
            }
            OverflowPolicy::Block { timeout_ms } => {
                match sender.send_timeout(item, Duration::from_millis(timeout_ms)) {
                    Ok(()) => Ok(()),
                    Err(SendTimeoutError::Timeout(_)) => Err(self.reject()),
                    Err(SendTimeoutError::Disconnected(_)) => Err(self.disconnected()),
                }
            }
        }
    }

    /// Items lost to the overflow policy.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.sender.is_some()
    }

    /// Stop accepting work, let the worker finish what is queued, and join
    /// it. Idempotent.
    pub fn shutdown(&mut self) {
        self.sender.take();
        self.evictor.take();
        self.rescued.take();

        let Some(thread) = self.thread.take() else {
            return;
        };
        if thread.thread().id() == std::thread::current().id() {
            // Dropped from inside its own handler; the loop ends on its own.
            return;
        }
        if thread.join().is_err() {
            tracing::error!("[SerialQueue:{}] Worker panicked", self.name);
        }
    }

    fn evict(&self, item: T) {
        if (self.is_control)(&item) {
            if let Some(rescued) = &self.rescued {
                rescued.send(item).ok();
            }
            return;
        }
        self.dropped.fetch_add(1, Ordering::Relaxed);
        tracing::warn!("[SerialQueue:{}] Full, dropped oldest item", self.name);
    }

    fn reject(&self) -> StreamError {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        tracing::warn!("[SerialQueue:{}] Full, rejected item", self.name);
        StreamError::QueueFull(self.name.clone())
    }

    fn disconnected(&self) -> StreamError {
        StreamError::Runtime(format!("Queue '{}' worker is gone", self.name))
    }
}

impl<T: Send + 'static> Drop for SerialQueue<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
