//! Bus trait and transfer primitive for node communication.
//!
//! The [`SpiBus`] trait abstracts over the physical SPI link to one node.
//! Implementations exist for Linux spidev devices (`neuronlib-transport`)
//! and for deterministic testing (`MockBus` in `neuronlib-test-harness`).
//!
//! A [`Transfer`] is the unit of bus work: an ordered list of at most
//! [`MAX_SEGMENTS`] segment descriptors over a single transmit buffer,
//! submitted as one atomic operation. The receive buffer has the same
//! length as the transmit buffer; each segment clocks out
//! `tx[tx_offset..tx_offset + len]` while clocking in
//! `rx[rx_offset..rx_offset + len]`.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Maximum number of segment descriptors in one atomic submission.
pub const MAX_SEGMENTS: usize = 7;

/// One descriptor of an atomic bus transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Pause in microseconds after this segment, before the next one.
    pub delay_us: u16,
    /// Offset into the transmit buffer.
    pub tx_offset: usize,
    /// Offset into the receive buffer.
    pub rx_offset: usize,
    /// Number of bytes clocked in this segment. Zero for a delay slot.
    pub len: usize,
}

impl Segment {
    /// A zero-length segment that only carries a settling delay.
    pub const fn delay(delay_us: u16) -> Self {
        Segment {
            delay_us,
            tx_offset: 0,
            rx_offset: 0,
            len: 0,
        }
    }

    /// A data segment covering `len` bytes at `offset` in both buffers.
    pub const fn data(offset: usize, len: usize) -> Self {
        Segment {
            delay_us: 0,
            tx_offset: offset,
            rx_offset: offset,
            len,
        }
    }

    /// Returns `true` if this segment moves no data.
    pub fn is_delay(&self) -> bool {
        self.len == 0
    }
}

/// A fully rendered atomic bus transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    /// Segment descriptors, in submission order.
    pub segments: Vec<Segment>,
    /// Transmit buffer all segments index into.
    pub tx: Bytes,
    /// Clock rate to use for every segment of this transfer.
    pub speed_hz: u32,
}

impl Transfer {
    /// Number of bytes clocked over the whole transfer.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    /// Returns `true` if the transfer carries no data.
    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

/// Exclusive handle to one physical SPI bus.
///
/// The bus worker is the only owner of an `SpiBus`; no other task performs
/// a transfer on it. Implementations submit all segments of a [`Transfer`]
/// as one atomic operation and do not support cancelling a transfer once
/// it has been handed to the hardware.
#[async_trait]
pub trait SpiBus: Send + Sync {
    /// Submit `transfer` atomically and return the clocked-in bytes.
    ///
    /// The returned buffer has exactly `transfer.len()` bytes. A failure of
    /// the underlying submission is reported as
    /// [`Error::Transport`](crate::error::Error::Transport).
    async fn transfer(&mut self, transfer: Transfer) -> Result<Vec<u8>>;

    /// Change the maximum clock rate of the bus device.
    async fn set_speed(&mut self, speed_hz: u32) -> Result<()>;

    /// Path of the underlying device, for logging.
    fn device_path(&self) -> &str;
}
