//! Bus worker: the single task that owns a node's SPI bus.
//!
//! Callers never touch the bus. They hand messages to the worker through a
//! bounded FIFO queue and receive the outcome on a one-shot channel. The
//! worker dispatches one message at a time, in queue order:
//!
//! 1. start the message deadline,
//! 2. render its segments and submit them as one atomic transfer,
//! 3. validate the clocked-in reply against the request,
//! 4. complete the message and pause for the inter-message gap.
//!
//! A transfer that misses its deadline completes the message with
//! [`Error::Timeout`] and the worker moves on to the next one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use neuronlib_core::bus::SpiBus;
use neuronlib_core::error::{Error, Result};

use crate::message::Message;
use crate::reply::{PendingReply, Reply};
use crate::segment::{self, DEFAULT_SETTLING_DELAY_US};
use crate::version::DEFAULT_SPEED_HZ;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Configuration for a bus worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Settling delay carried by the first segment of every transfer.
    pub settling_delay_us: u16,
    /// Pause after each message before the next one is dispatched.
    pub message_gap: Duration,
    /// Clock rate used until [`BusWorker::set_speed`] succeeds.
    pub default_speed_hz: u32,
    /// Capacity of the request queue.
    pub queue_depth: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            settling_delay_us: DEFAULT_SETTLING_DELAY_US,
            message_gap: Duration::from_millis(1),
            default_speed_hz: DEFAULT_SPEED_HZ,
            queue_depth: 32,
        }
    }
}

/// A request sent from callers to the worker task.
pub(crate) enum Request {
    /// Dispatch a protocol message.
    Message {
        id: u64,
        message: Message,
        reply: oneshot::Sender<Result<Reply>>,
    },
    /// Change the bus clock rate for all following transfers.
    SetSpeed {
        speed_hz: u32,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Graceful shutdown; returns the bus.
    Shutdown {
        reply: oneshot::Sender<Box<dyn SpiBus>>,
    },
}

/// Handle to a running bus worker.
pub struct BusWorker {
    cmd_tx: mpsc::Sender<Request>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    next_id: AtomicU64,
}

impl BusWorker {
    /// Queue `message` and return a handle to its outcome.
    ///
    /// Waits only for queue space, not for the message to be dispatched.
    pub async fn submit(&self, message: Message) -> Result<PendingReply> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Request::Message {
                id,
                message,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::NotConnected)?;
        Ok(PendingReply::new(id, reply_rx))
    }

    /// Queue `message` and wait for its outcome.
    pub async fn execute(&self, message: Message) -> Result<Reply> {
        self.submit(message).await?.wait().await
    }

    /// Change the bus clock rate. Takes its place in the queue like any
    /// message, so earlier messages still go out at the old rate.
    pub async fn set_speed(&self, speed_hz: u32) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Request::SetSpeed {
                speed_hz,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::NotConnected)?;

        match reply_rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::NotConnected),
        }
    }

    /// Returns `true` while the worker task is running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the worker after the messages already queued and recover the bus.
    pub async fn shutdown(self) -> Result<Box<dyn SpiBus>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self
            .cmd_tx
            .send(Request::Shutdown { reply: reply_tx })
            .await;
        let bus = reply_rx.await.map_err(|_| Error::NotConnected)?;
        let _ = self.task.await;
        Ok(bus)
    }

    /// Stop the worker without waiting for queued messages.
    pub(crate) fn abort(&self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Spawn a bus worker that exclusively owns `bus`.
pub fn spawn_bus_worker(bus: Box<dyn SpiBus>, config: WorkerConfig) -> BusWorker {
    let (cmd_tx, cmd_rx) = mpsc::channel::<Request>(config.queue_depth.max(1));
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    let task = tokio::spawn(worker_loop(bus, config, cmd_rx, cancel_clone));

    BusWorker {
        cmd_tx,
        cancel,
        task,
        next_id: AtomicU64::new(0),
    }
}

// ---------------------------------------------------------------------------
// Worker loop
// ---------------------------------------------------------------------------

/// The dispatch loop. Runs as a spawned Tokio task.
///
/// Sleeps on the queue while it is empty; cancellation wins over pending
/// requests.
async fn worker_loop(
    mut bus: Box<dyn SpiBus>,
    config: WorkerConfig,
    mut cmd_rx: mpsc::Receiver<Request>,
    cancel: CancellationToken,
) {
    let mut speed_hz: Option<u32> = None;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!(path = bus.device_path(), "bus worker cancelled");
                break;
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Request::Message { id, message, reply }) => {
                        let speed = speed_hz.unwrap_or(config.default_speed_hz);
                        let result = dispatch(&mut *bus, id, &message, speed, &config).await;
                        let _ = reply.send(result);
                        if !config.message_gap.is_zero() {
                            tokio::time::sleep(config.message_gap).await;
                        }
                    }
                    Some(Request::SetSpeed { speed_hz: requested, reply }) => {
                        let result = bus.set_speed(requested).await;
                        match &result {
                            Ok(()) => {
                                debug!(
                                    path = bus.device_path(),
                                    speed_hz = requested,
                                    "bus speed changed"
                                );
                                speed_hz = Some(requested);
                            }
                            Err(e) => {
                                tracing::warn!(
                                    path = bus.device_path(),
                                    speed_hz = requested,
                                    error = %e,
                                    "bus speed change failed"
                                );
                            }
                        }
                        let _ = reply.send(result);
                    }
                    Some(Request::Shutdown { reply }) => {
                        debug!(path = bus.device_path(), "bus worker shutdown requested");
                        let _ = reply.send(bus);
                        return;
                    }
                    None => {
                        debug!("all request senders dropped, exiting bus worker");
                        break;
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Run one message over the bus and validate the reply.
async fn dispatch(
    bus: &mut dyn SpiBus,
    id: u64,
    message: &Message,
    speed_hz: u32,
    config: &WorkerConfig,
) -> Result<Reply> {
    let deadline = Instant::now() + message.timeout();
    let function = message.function();
    let address = message.address();

    let transfer = segment::render(message, config.settling_delay_us, speed_hz)?;
    debug!(
        id,
        %function,
        address,
        len = transfer.len(),
        segments = transfer.segments.len(),
        speed_hz,
        "dispatching message"
    );

    let rx = match tokio::time::timeout_at(deadline, bus.transfer(transfer)).await {
        Ok(Ok(rx)) => rx,
        Ok(Err(e)) => {
            tracing::warn!(id, %function, address, error = %e, "transfer failed");
            return Err(match e {
                Error::Transport(reason) => Error::Transport(reason),
                other => Error::Transport(other.to_string()),
            });
        }
        Err(_) => {
            tracing::warn!(
                id,
                %function,
                address,
                timeout_ms = message.timeout().as_millis() as u64,
                "message timed out"
            );
            return Err(Error::Timeout);
        }
    };

    message.parse_reply(&rx).inspect_err(|e| {
        tracing::warn!(id, %function, address, error = %e, "reply rejected");
    })
}
