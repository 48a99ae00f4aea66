//! # Receiver Thread
//!
//! One dedicated thread polls the [`ByteSource`] and runs the whole decode
//! pipeline synchronously. When nothing is available it sleeps for the poll
//! interval instead of blocking in a read, so a close request is observed
//! within one poll interval. Readings leave the thread over an unbounded
//! channel; [`spawn_dispatcher`] drains that channel on a single blocking
//! worker and calls the sink in arrival order, so a slow sink never stalls
//! the reader.
//!
//! The source is shared behind a mutex with [`ReceiverHandle::close`], which
//! may be called from any thread while a read is in flight.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Result};
use log::{debug, error, info, trace, warn};
use tokio::sync::mpsc;

use crate::error::StreamError;
use crate::logutil::hex_snippet;
use crate::metrics::DecodeStats;
use crate::pipeline::Pipeline;
use crate::reading::Reading;
use crate::source::ByteSource;

const READ_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Consumer of decoded readings.
pub trait ReadingSink: Send + 'static {
    fn on_reading(&mut self, reading: Reading);
}

impl<F> ReadingSink for F
where
    F: FnMut(Reading) + Send + 'static,
{
    fn on_reading(&mut self, reading: Reading) {
        self(reading)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiverOptions {
    /// Sleep between polls when the source has nothing to offer.
    pub poll_interval: Duration,
    /// Upper bound for a single read.
    pub read_chunk_size: usize,
    /// Stop on its own once the source reports it is exhausted (replays).
    pub stop_when_exhausted: bool,
}

impl Default for ReceiverOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            read_chunk_size: 8 * 1024,
            stop_when_exhausted: false,
        }
    }
}

type SharedSource = Arc<Mutex<Box<dyn ByteSource>>>;

fn lock_source(source: &SharedSource) -> MutexGuard<'_, Box<dyn ByteSource>> {
    source.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Control path for a running receiver.
#[derive(Clone)]
pub struct ReceiverHandle {
    running: Arc<AtomicBool>,
    source: SharedSource,
}

impl ReceiverHandle {
    /// Ask the read thread to stop and release the source.
    pub fn close(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            debug!("receiver close requested");
        }
        lock_source(&self.source).close();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

pub struct Receiver {
    handle: ReceiverHandle,
    stats: Arc<DecodeStats>,
    thread: Option<JoinHandle<Result<(), StreamError>>>,
}

impl Receiver {
    /// Spawn the read thread. Readings are sent on `tx`.
    pub fn start<S>(
        source: S,
        pipeline: Pipeline,
        tx: mpsc::UnboundedSender<Reading>,
        opts: ReceiverOptions,
    ) -> Result<Self>
    where
        S: ByteSource + 'static,
    {
        let boxed: Box<dyn ByteSource> = Box::new(source);
        let source: SharedSource = Arc::new(Mutex::new(boxed));
        let running = Arc::new(AtomicBool::new(true));
        let stats = pipeline.stats();

        let worker = ReadLoop {
            running: Arc::clone(&running),
            source: Arc::clone(&source),
            pipeline,
            tx,
            opts,
        };
        let thread = thread::Builder::new()
            .name("esp3-reader".to_string())
            .spawn(move || worker.run())
            .map_err(|e| anyhow!("Failed to spawn reader thread: {}", e))?;

        Ok(Self {
            handle: ReceiverHandle { running, source },
            stats,
            thread: Some(thread),
        })
    }

    /// Spawn the read thread plus a dispatcher feeding `sink`. Must be called
    /// from within a Tokio runtime.
    pub fn start_with_sink<S, K>(
        source: S,
        pipeline: Pipeline,
        sink: K,
        opts: ReceiverOptions,
    ) -> Result<(Self, tokio::task::JoinHandle<K>)>
    where
        S: ByteSource + 'static,
        K: ReadingSink,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let receiver = Self::start(source, pipeline, tx, opts)?;
        Ok((receiver, spawn_dispatcher(rx, sink)))
    }

    pub fn handle(&self) -> ReceiverHandle {
        self.handle.clone()
    }

    pub fn stats(&self) -> Arc<DecodeStats> {
        Arc::clone(&self.stats)
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    /// Wait for the read thread to end. A fatal stream error is returned.
    pub fn join(mut self) -> Result<()> {
        self.join_thread()
    }

    /// Close the source and wait for the read thread.
    pub fn shutdown(mut self) -> Result<()> {
        self.handle.close();
        self.join_thread()
    }

    fn join_thread(&mut self) -> Result<()> {
        match self.thread.take() {
            Some(thread) => match thread.join() {
                Ok(result) => result.map_err(anyhow::Error::from),
                Err(_) => Err(anyhow!("reader thread panicked")),
            },
            None => Ok(()),
        }
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.handle.close();
            if let Err(e) = self.join_thread() {
                warn!("receiver stopped with error: {}", e);
            }
        }
    }
}

/// Drain `rx` on one blocking worker, calling `sink` in arrival order.
/// Resolves to the sink once every sender is gone.
pub fn spawn_dispatcher<K>(
    mut rx: mpsc::UnboundedReceiver<Reading>,
    mut sink: K,
) -> tokio::task::JoinHandle<K>
where
    K: ReadingSink,
{
    tokio::task::spawn_blocking(move || {
        while let Some(reading) = rx.blocking_recv() {
            sink.on_reading(reading);
        }
        sink
    })
}

struct ReadLoop {
    running: Arc<AtomicBool>,
    source: SharedSource,
    pipeline: Pipeline,
    tx: mpsc::UnboundedSender<Reading>,
    opts: ReceiverOptions,
}

enum Poll {
    Data(usize),
    Idle,
    Exhausted,
    Failed(std::io::Error),
}

impl ReadLoop {
    fn run(mut self) -> Result<(), StreamError> {
        info!("Starting ESP3 reader thread");
        let stats = self.pipeline.stats();
        let mut buf = vec![0u8; self.opts.read_chunk_size.max(1)];

        while self.running.load(Ordering::Acquire) {
            match self.poll(&mut buf) {
                Ok(Poll::Data(n)) => {
                    trace!("RAW {} bytes: {}", n, hex_snippet(&buf[..n], 64));
                    match self.pipeline.feed(&buf[..n]) {
                        Ok(readings) => {
                            for reading in readings {
                                debug!("{}", reading);
                                if self.tx.send(reading).is_err() {
                                    trace!("no reading consumer attached");
                                }
                            }
                        }
                        Err(e) => return self.fail(e),
                    }
                }
                Ok(Poll::Idle) => thread::sleep(self.opts.poll_interval),
                Ok(Poll::Exhausted) => {
                    debug!("byte source exhausted");
                    self.running.store(false, Ordering::Release);
                }
                Ok(Poll::Failed(e)) => {
                    warn!("Serial read error (continuing): {}", e);
                    stats.inc_read_errors();
                    thread::sleep(READ_ERROR_BACKOFF);
                }
                Err(e) => return self.fail(e),
            }
        }

        info!("ESP3 reader thread stopped");
        Ok(())
    }

    fn poll(&mut self, buf: &mut [u8]) -> Result<Poll, StreamError> {
        let mut source = lock_source(&self.source);
        // Close may have happened while we waited for the lock.
        if !self.running.load(Ordering::Acquire) {
            return Ok(Poll::Idle);
        }
        let available = match source.available() {
            Ok(n) => n,
            Err(e) => return Ok(Poll::Failed(e)),
        };
        if available == 0 {
            if self.opts.stop_when_exhausted && source.is_exhausted() {
                return Ok(Poll::Exhausted);
            }
            return Ok(Poll::Idle);
        }

        let free = self.pipeline.free_capacity();
        if free == 0 {
            return Err(StreamError::BufferOverflow {
                buffered: self.pipeline.buffered(),
                incoming: available,
                capacity: self.pipeline.capacity(),
            });
        }
        let want = available.min(buf.len()).min(free);
        match source.read(&mut buf[..want]) {
            Ok(0) => Ok(Poll::Idle),
            Ok(n) => Ok(Poll::Data(n)),
            Err(e) => Ok(Poll::Failed(e)),
        }
    }

    fn fail(&self, e: StreamError) -> Result<(), StreamError> {
        error!("ESP3 reader stopping: {}", e);
        self.running.store(false, Ordering::Release);
        Err(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enocean::FramerOptions;
    use crate::profile::ProfileRegistry;
    use crate::source::ReplaySource;

    #[test]
    fn close_stops_an_idle_reader() {
        let pipeline = Pipeline::new(FramerOptions::default(), ProfileRegistry::with_defaults());
        let (tx, _rx) = mpsc::unbounded_channel();
        let receiver = Receiver::start(
            ReplaySource::default(),
            pipeline,
            tx,
            ReceiverOptions::default(),
        )
        .unwrap();

        let handle = receiver.handle();
        assert!(handle.is_running());
        handle.close();
        assert!(!handle.is_running());
        receiver.join().unwrap();
    }

    #[test]
    fn zero_capacity_is_fatal() {
        let opts = FramerOptions {
            capacity: 0,
            ..FramerOptions::default()
        };
        let pipeline = Pipeline::new(opts, ProfileRegistry::with_defaults());
        let (tx, _rx) = mpsc::unbounded_channel();
        let receiver = Receiver::start(
            ReplaySource::new([vec![0x55, 0x00]]),
            pipeline,
            tx,
            ReceiverOptions::default(),
        )
        .unwrap();

        let err = receiver.join().unwrap_err();
        assert!(err.to_string().contains("overflow"), "{err}");
    }
}
