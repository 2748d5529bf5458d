//! Feature publication over a TCP pub/sub socket.
//!
//! The pipeline pushes serialized vectors into a bounded lock-free
//! queue; a publisher thread pops them and fans each line out to every
//! connected subscriber. When the queue is full the oldest pending
//! message is displaced and counted, so the pipeline never blocks on a
//! slow transport.

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_queue::ArrayQueue;
use thiserror::Error;

use crate::shutdown::ShutdownFlag;

/// Default transport endpoint.
pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:5555";

/// Default high-water mark for the in-memory queue.
pub const DEFAULT_HIGH_WATER_MARK: usize = 10_000;

/// Topic prefix prepended to every published line.
const TOPIC: &str = "features";

const IDLE_POLL: Duration = Duration::from_millis(5);
const ACCEPT_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("cannot bind publisher endpoint {endpoint}: {source}")]
    Bind {
        endpoint: String,
        source: std::io::Error,
    },
}

/// Handle owned by the pipeline. Dropping it does not stop the threads;
/// call `shutdown` via the shared flag and then `join`.
#[derive(Debug)]
pub struct FeaturePublisher {
    queue: Arc<ArrayQueue<String>>,
    overflow: Arc<AtomicU64>,
    published: u64,
    writer: Option<JoinHandle<()>>,
    acceptor: Option<JoinHandle<()>>,
}

impl FeaturePublisher {
    /// Bind the endpoint and start the acceptor and writer threads.
    pub fn bind(
        endpoint: &str,
        high_water_mark: usize,
        shutdown: ShutdownFlag,
    ) -> Result<Self, PublishError> {
        let listener = TcpListener::bind(endpoint).map_err(|source| PublishError::Bind {
            endpoint: endpoint.to_string(),
            source,
        })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| PublishError::Bind {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let queue = Arc::new(ArrayQueue::new(high_water_mark.max(1)));
        let overflow = Arc::new(AtomicU64::new(0));
        let subscribers: Arc<Mutex<Vec<TcpStream>>> = Arc::new(Mutex::new(Vec::new()));

        let acceptor = {
            let subscribers = Arc::clone(&subscribers);
            let shutdown = shutdown.clone();
            thread::spawn(move || accept_loop(listener, subscribers, shutdown))
        };

        let writer = {
            let queue = Arc::clone(&queue);
            let subscribers = Arc::clone(&subscribers);
            let shutdown = shutdown.clone();
            thread::spawn(move || write_loop(queue, subscribers, shutdown))
        };

        log::info!("feature publisher listening on {endpoint}");
        Ok(Self {
            queue,
            overflow,
            published: 0,
            writer: Some(writer),
            acceptor: Some(acceptor),
        })
    }

    /// Enqueue one serialized feature vector. Never blocks; on overflow
    /// the oldest pending message is dropped and counted.
    pub fn publish(&mut self, json: String) {
        self.published += 1;
        if self.queue.force_push(json).is_some() {
            self.overflow.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn overflow(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }

    /// Wait for the worker threads after shutdown has been triggered.
    pub fn join(mut self) {
        if let Some(handle) = self.writer.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.acceptor.take() {
            let _ = handle.join();
        }
    }

    /// Queue-only handle with no worker threads, for exercising the
    /// overflow discipline in isolation.
    #[cfg(test)]
    fn detached(high_water_mark: usize) -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(high_water_mark)),
            overflow: Arc::new(AtomicU64::new(0)),
            published: 0,
            writer: None,
            acceptor: None,
        }
    }
}

fn accept_loop(
    listener: TcpListener,
    subscribers: Arc<Mutex<Vec<TcpStream>>>,
    shutdown: ShutdownFlag,
) {
    while !shutdown.is_set() {
        match listener.accept() {
            Ok((stream, peer)) => {
                log::info!("feature subscriber connected: {peer}");
                if let Ok(mut subscribers) = subscribers.lock() {
                    subscribers.push(stream);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(err) => {
                log::warn!("subscriber accept failed: {err}");
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
}

fn write_loop(
    queue: Arc<ArrayQueue<String>>,
    subscribers: Arc<Mutex<Vec<TcpStream>>>,
    shutdown: ShutdownFlag,
) {
    loop {
        match queue.pop() {
            Some(json) => {
                let line = format!("{TOPIC} {json}\n");
                if let Ok(mut subscribers) = subscribers.lock() {
                    subscribers.retain_mut(|stream| match stream.write_all(line.as_bytes()) {
                        Ok(()) => true,
                        Err(err) => {
                            log::info!("dropping feature subscriber: {err}");
                            false
                        }
                    });
                }
            }
            None => {
                // Drain fully before honoring shutdown.
                if shutdown.is_set() {
                    return;
                }
                thread::sleep(IDLE_POLL);
            }
        }
    }
}
