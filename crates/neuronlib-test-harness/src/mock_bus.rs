//! Mock SPI bus for deterministic testing of the protocol engine.
//!
//! [`MockBus`] implements the [`SpiBus`] trait with pre-loaded
//! request/reply pairs. Every submitted [`Transfer`] is recorded in a
//! [`TransferLog`] that stays readable after the bus has been boxed and
//! handed to a bus worker.
//!
//! # Example
//!
//! ```
//! use neuronlib_test_harness::MockBus;
//!
//! let mut bus = MockBus::new();
//! // When this frame is transmitted, clock this reply back in.
//! bus.expect(&[0x05, 0x05, 0x01, 0x00, 0xC2, 0x47],
//!            &[0x05, 0x05, 0x01, 0x00, 0xC2, 0x47]);
//! let log = bus.log();
//! assert!(log.is_empty());
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use neuronlib_core::bus::{SpiBus, Transfer};
use neuronlib_core::error::{Error, Result};

/// What the mock does with a matching transfer.
#[derive(Debug, Clone)]
enum Response {
    /// Clock these bytes into the receive buffer.
    Reply(Vec<u8>),
    /// Fail the submission.
    Fail(String),
    /// Never complete.
    Hang,
}

/// A pre-loaded exchange for the mock bus.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be transmitted, or `None` for any.
    request: Option<Vec<u8>>,
    response: Response,
}

#[derive(Debug, Default)]
struct LogInner {
    transfers: Vec<Transfer>,
    speed_changes: Vec<u32>,
}

/// Shared record of everything a [`MockBus`] was asked to do.
#[derive(Debug, Clone, Default)]
pub struct TransferLog {
    inner: Arc<Mutex<LogInner>>,
}

impl TransferLog {
    fn lock(&self) -> MutexGuard<'_, LogInner> {
        // A panicking test thread must not hide the log from the others.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All transfers submitted so far, in submission order.
    pub fn transfers(&self) -> Vec<Transfer> {
        self.lock().transfers.clone()
    }

    /// Transmitted frames, in submission order.
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.lock()
            .transfers
            .iter()
            .map(|t| t.tx.to_vec())
            .collect()
    }

    /// Every speed applied through [`SpiBus::set_speed`], in order.
    pub fn speed_changes(&self) -> Vec<u32> {
        self.lock().speed_changes.clone()
    }

    /// Number of transfers submitted so far.
    pub fn len(&self) -> usize {
        self.lock().transfers.len()
    }

    /// Returns `true` if no transfer has been submitted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A mock [`SpiBus`] for testing without hardware.
///
/// Expectations are consumed in order, one per transfer. When the queue is
/// exhausted the bus either echoes the transmitted frame back (see
/// [`MockBus::echoing`]) or fails the transfer.
#[derive(Debug)]
pub struct MockBus {
    expectations: VecDeque<Expectation>,
    echo: bool,
    fail_speed: bool,
    path: String,
    log: TransferLog,
}

impl MockBus {
    /// Create a mock bus with no expectations.
    pub fn new() -> Self {
        MockBus {
            expectations: VecDeque::new(),
            echo: false,
            fail_speed: false,
            path: "/dev/spidev-mock".to_string(),
            log: TransferLog::default(),
        }
    }

    /// Create a mock bus that echoes every unexpected frame back.
    ///
    /// An echoed frame carries the request's own opcode, address and
    /// checksum, which is what a board returns for most write operations.
    pub fn echoing() -> Self {
        MockBus {
            echo: true,
            ..Self::new()
        }
    }

    /// Override the reported device path.
    pub fn with_path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    /// Expect `request` to be transmitted next and clock in `reply`.
    ///
    /// A reply shorter than the transfer is padded with zeros; a longer one
    /// is truncated.
    pub fn expect(&mut self, request: &[u8], reply: &[u8]) {
        self.expectations.push_back(Expectation {
            request: Some(request.to_vec()),
            response: Response::Reply(reply.to_vec()),
        });
    }

    /// Clock in `reply` for the next transfer, whatever it transmits.
    pub fn reply_next(&mut self, reply: &[u8]) {
        self.expectations.push_back(Expectation {
            request: None,
            response: Response::Reply(reply.to_vec()),
        });
    }

    /// Fail the next transfer as if the ioctl had returned an error.
    pub fn fail_next(&mut self, reason: &str) {
        self.expectations.push_back(Expectation {
            request: None,
            response: Response::Fail(reason.to_string()),
        });
    }

    /// Never complete the next transfer.
    pub fn hang_next(&mut self) {
        self.expectations.push_back(Expectation {
            request: None,
            response: Response::Hang,
        });
    }

    /// Make every [`SpiBus::set_speed`] call fail.
    pub fn fail_speed_changes(&mut self, fail: bool) {
        self.fail_speed = fail;
    }

    /// Handle to the transfer log; stays valid after the bus is boxed.
    pub fn log(&self) -> TransferLog {
        self.log.clone()
    }

    /// Number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

fn fit(mut reply: Vec<u8>, len: usize) -> Vec<u8> {
    reply.resize(len, 0);
    reply
}

#[async_trait]
impl SpiBus for MockBus {
    async fn transfer(&mut self, transfer: Transfer) -> Result<Vec<u8>> {
        let len = transfer.len();
        let tx = transfer.tx.to_vec();
        self.log.lock().transfers.push(transfer);

        let Some(expectation) = self.expectations.pop_front() else {
            if self.echo {
                return Ok(tx);
            }
            return Err(Error::Transport("no more expectations in mock bus".into()));
        };

        if let Some(request) = expectation.request {
            if request != tx {
                return Err(Error::Transport(format!(
                    "unexpected frame: expected {request:02X?}, got {tx:02X?}"
                )));
            }
        }

        match expectation.response {
            Response::Reply(reply) => Ok(fit(reply, len)),
            Response::Fail(reason) => Err(Error::Transport(reason)),
            Response::Hang => std::future::pending().await,
        }
    }

    async fn set_speed(&mut self, speed_hz: u32) -> Result<()> {
        if self.fail_speed {
            return Err(Error::Transport("cannot set speed".into()));
        }
        self.log.lock().speed_changes.push(speed_hz);
        Ok(())
    }

    fn device_path(&self) -> &str {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use neuronlib_core::bus::Segment;
    use std::time::Duration;

    fn transfer(tx: &[u8]) -> Transfer {
        Transfer {
            segments: vec![Segment::delay(10), Segment::data(0, tx.len())],
            tx: Bytes::copy_from_slice(tx),
            speed_hz: 8_000_000,
        }
    }

    #[tokio::test]
    async fn mock_bus_basic_exchange() {
        let mut bus = MockBus::new();
        bus.expect(&[1, 2, 3, 4, 5, 6], &[6, 5, 4, 3, 2, 1]);

        let rx = bus.transfer(transfer(&[1, 2, 3, 4, 5, 6])).await.unwrap();
        assert_eq!(rx, vec![6, 5, 4, 3, 2, 1]);
        assert_eq!(bus.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn mock_bus_pads_short_reply() {
        let mut bus = MockBus::new();
        bus.reply_next(&[0xAA]);

        let rx = bus.transfer(transfer(&[0; 4])).await.unwrap();
        assert_eq!(rx, vec![0xAA, 0, 0, 0]);
    }

    #[tokio::test]
    async fn mock_bus_wrong_frame_is_transport_error() {
        let mut bus = MockBus::new();
        bus.expect(&[1], &[1]);

        let result = bus.transfer(transfer(&[2])).await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn mock_bus_no_expectations_errors() {
        let mut bus = MockBus::new();
        let result = bus.transfer(transfer(&[1])).await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn mock_bus_echoes_when_exhausted() {
        let mut bus = MockBus::echoing();
        let rx = bus.transfer(transfer(&[9, 8, 7])).await.unwrap();
        assert_eq!(rx, vec![9, 8, 7]);
    }

    #[tokio::test]
    async fn mock_bus_fail_next() {
        let mut bus = MockBus::echoing();
        bus.fail_next("ioctl failed");

        let result = bus.transfer(transfer(&[1])).await;
        match result {
            Err(Error::Transport(reason)) => assert_eq!(reason, "ioctl failed"),
            other => panic!("expected transport error, got {other:?}"),
        }
        // The following transfer falls back to echo.
        assert!(bus.transfer(transfer(&[1])).await.is_ok());
    }

    #[tokio::test]
    async fn mock_bus_hang_never_completes() {
        let mut bus = MockBus::new();
        bus.hang_next();

        let result =
            tokio::time::timeout(Duration::from_millis(20), bus.transfer(transfer(&[1]))).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn mock_bus_log_survives_boxing() {
        let bus = MockBus::echoing();
        let log = bus.log();
        let mut boxed: Box<dyn SpiBus> = Box::new(bus);

        boxed.transfer(transfer(&[1, 2])).await.unwrap();
        boxed.set_speed(12_000_000).await.unwrap();

        assert_eq!(log.len(), 1);
        assert_eq!(log.sent_frames(), vec![vec![1, 2]]);
        assert_eq!(log.speed_changes(), vec![12_000_000]);
    }

    #[tokio::test]
    async fn mock_bus_failing_speed_change() {
        let mut bus = MockBus::new();
        bus.fail_speed_changes(true);
        let log = bus.log();

        assert!(bus.set_speed(12_000_000).await.is_err());
        assert!(log.speed_changes().is_empty());
    }
}
