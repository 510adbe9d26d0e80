//! Linux spidev transport.
//!
//! [`SpidevBus`] implements [`SpiBus`] for a spidev character device. The
//! ioctl is blocking, so every transfer runs on the blocking thread pool.
//! The device handle sits behind a mutex: if the caller stops waiting for a
//! transfer (deadline exceeded), the ioctl still runs to completion and the
//! next transfer waits for the device to be released.

use std::ops::Range;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use spidev::{SpiModeFlags, Spidev, SpidevOptions, SpidevTransfer};
use tracing::{debug, info, warn};

use neuronlib_core::bus::{SpiBus, Transfer};
use neuronlib_core::error::{Error, Result};

/// SPI transport over a Linux spidev device.
pub struct SpidevBus {
    device: Arc<Mutex<Spidev>>,
    path: String,
}

impl SpidevBus {
    /// Open a spidev device and configure it for `speed_hz`.
    ///
    /// Returns [`Error::DeviceUnavailable`] if the device node is missing or
    /// cannot be opened and configured.
    pub async fn open(path: &str, speed_hz: u32) -> Result<Self> {
        info!(device = path, "initializing SPI interface");
        if !Path::new(path).exists() {
            warn!(device = path, "SPI interface does not exist");
            return Err(Error::DeviceUnavailable(format!("{path} does not exist")));
        }

        let device_path = path.to_string();
        let spi = tokio::task::spawn_blocking(move || -> std::io::Result<Spidev> {
            let mut spi = Spidev::open(&device_path)?;
            let options = SpidevOptions::new()
                .bits_per_word(8)
                .max_speed_hz(speed_hz)
                .mode(SpiModeFlags::SPI_MODE_0)
                .build();
            spi.configure(&options)?;
            Ok(spi)
        })
        .await
        .map_err(|e| Error::DeviceUnavailable(format!("{path}: open task failed: {e}")))?
        .map_err(|e| {
            warn!(device = path, error = %e, "could not open SPI interface");
            Error::DeviceUnavailable(format!("{path}: {e}"))
        })?;

        Ok(SpidevBus {
            device: Arc::new(Mutex::new(spi)),
            path: path.to_string(),
        })
    }
}

/// Where one ioctl descriptor points.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    /// Zero-length descriptor carrying only a pause.
    Delay(u16),
    /// Data descriptor over `tx` in the transmit buffer and the same range
    /// of the receive buffer.
    Data { tx: Range<usize>, delay_us: u16 },
}

/// Check the segments of `transfer` and lay out one slot per descriptor.
///
/// Data segments must be contiguous and in order, starting at offset 0 of
/// the receive buffer, and must stay inside the transmit buffer.
fn layout(transfer: &Transfer) -> Result<Vec<Slot>> {
    let mut slots = Vec::with_capacity(transfer.segments.len());
    let mut cursor = 0usize;

    for segment in &transfer.segments {
        if segment.is_delay() {
            slots.push(Slot::Delay(segment.delay_us));
            continue;
        }
        if segment.rx_offset != cursor || cursor + segment.len > transfer.len() {
            return Err(Error::Transport(format!(
                "segment at offset {} (len {}) does not follow offset {cursor}",
                segment.rx_offset, segment.len
            )));
        }
        let tx = segment.tx_offset..segment.tx_offset + segment.len;
        if tx.end > transfer.tx.len() {
            return Err(Error::Transport(format!(
                "segment at offset {} exceeds transmit buffer",
                segment.tx_offset
            )));
        }
        cursor += segment.len;
        slots.push(Slot::Data {
            tx,
            delay_us: segment.delay_us,
        });
    }
    Ok(slots)
}

/// Build the ioctl descriptors for `transfer`, each data descriptor
/// borrowing the next slice of `rx`.
fn descriptors<'a>(
    transfer: &'a Transfer,
    rx: &'a mut [u8],
) -> Result<Vec<SpidevTransfer<'a, 'a>>> {
    if rx.len() < transfer.len() {
        return Err(Error::Transport(format!(
            "receive buffer holds {} bytes, transfer clocks {}",
            rx.len(),
            transfer.len()
        )));
    }

    let slots = layout(transfer)?;
    let mut descriptors = Vec::with_capacity(slots.len());
    let mut remaining = rx;
    for slot in slots {
        let mut descriptor = match slot {
            Slot::Delay(delay_us) => SpidevTransfer::delay(delay_us),
            Slot::Data { tx, delay_us } => {
                let (head, tail) = std::mem::take(&mut remaining).split_at_mut(tx.len());
                remaining = tail;
                let mut descriptor = SpidevTransfer::read_write(&transfer.tx[tx], head);
                descriptor.delay_usecs = delay_us;
                descriptor
            }
        };
        descriptor.speed_hz = transfer.speed_hz;
        descriptors.push(descriptor);
    }
    Ok(descriptors)
}

/// Submit `transfer` as one multi-descriptor ioctl.
fn submit(device: &Spidev, transfer: &Transfer) -> Result<Vec<u8>> {
    let mut rx = vec![0u8; transfer.len()];
    {
        let mut descriptors = descriptors(transfer, &mut rx)?;
        device
            .transfer_multiple(&mut descriptors)
            .map_err(|e| Error::Transport(format!("can't send SPI message: {e}")))?;
    }
    Ok(rx)
}

#[async_trait]
impl SpiBus for SpidevBus {
    async fn transfer(&mut self, transfer: Transfer) -> Result<Vec<u8>> {
        let device = Arc::clone(&self.device);
        tokio::task::spawn_blocking(move || {
            let device = device
                .lock()
                .map_err(|_| Error::Transport("SPI device lock poisoned".into()))?;
            submit(&device, &transfer)
        })
        .await
        .map_err(|e| Error::Transport(format!("transfer task failed: {e}")))?
    }

    async fn set_speed(&mut self, speed_hz: u32) -> Result<()> {
        info!(device = %self.path, mhz = speed_hz / 1_000_000, "setting SPI speed");
        let device = Arc::clone(&self.device);
        tokio::task::spawn_blocking(move || {
            let mut device = device
                .lock()
                .map_err(|_| Error::Transport("SPI device lock poisoned".into()))?;
            let options = SpidevOptions::new().max_speed_hz(speed_hz).build();
            device
                .configure(&options)
                .map_err(|e| Error::Transport(format!("cannot set speed: {e}")))
        })
        .await
        .map_err(|e| Error::Transport(format!("speed task failed: {e}")))??;
        debug!(device = %self.path, speed_hz, "SPI speed applied");
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

    fn transfer(segments: Vec<Segment>, len: usize) -> Transfer {
        Transfer {
            segments,
            tx: Bytes::from((0..len).map(|i| i as u8).collect::<Vec<_>>()),
            speed_hz: 12_000_000,
        }
    }

    /// Delay slot, 4-byte header and five body chunks: the largest
    /// transfer a single submission takes.
    fn five_chunk_transfer() -> Transfer {
        let frame_len = 4 + 4 * 64 + 10;
        let mut segments = vec![Segment::delay(10), Segment::data(0, 4)];
        let mut offset = 4;
        while offset < frame_len {
            let len = (frame_len - offset).min(64);
            segments.push(Segment::data(offset, len));
            offset += len;
        }
        transfer(segments, frame_len)
    }

    #[test]
    fn one_phase_layout() {
        let t = transfer(vec![Segment::delay(10), Segment::data(0, 6)], 6);
        assert_eq!(
            layout(&t).unwrap(),
            vec![
                Slot::Delay(10),
                Slot::Data {
                    tx: 0..6,
                    delay_us: 0,
                },
            ]
        );

        let mut rx = vec![0u8; t.len()];
        let descriptors = descriptors(&t, &mut rx).unwrap();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].delay_usecs, 10);
        assert!(descriptors.iter().all(|d| d.speed_hz == 12_000_000));
    }

    #[test]
    fn five_chunk_layout_covers_frame() {
        let t = five_chunk_transfer();
        assert_eq!(t.segments.len(), 7);

        let slots = layout(&t).unwrap();
        assert_eq!(slots[0], Slot::Delay(10));
        let mut offset = 0;
        for slot in &slots[1..] {
            match slot {
                Slot::Data { tx, .. } => {
                    assert_eq!(tx.start, offset);
                    offset = tx.end;
                }
                Slot::Delay(_) => panic!("delay slot inside data"),
            }
        }
        assert_eq!(offset, t.len());

        let mut rx = vec![0u8; t.len()];
        assert_eq!(descriptors(&t, &mut rx).unwrap().len(), 7);
    }

    #[test]
    fn malformed_transfers_rejected() {
        let cases = [
            (
                "rx gap",
                vec![
                    Segment::delay(10),
                    Segment::data(0, 4),
                    Segment {
                        delay_us: 0,
                        tx_offset: 4,
                        rx_offset: 5,
                        len: 3,
                    },
                ],
            ),
            (
                "out of order",
                vec![
                    Segment::delay(10),
                    Segment::data(4, 4),
                    Segment::data(0, 4),
                    Segment::data(8, 4),
                ],
            ),
            (
                "past tx end",
                vec![
                    Segment::delay(10),
                    Segment {
                        delay_us: 0,
                        tx_offset: 4,
                        rx_offset: 0,
                        len: 8,
                    },
                ],
            ),
            (
                "longer than frame",
                vec![
                    Segment::delay(10),
                    Segment::data(0, 4),
                    Segment::data(4, 4),
                    Segment::data(8, 4),
                ],
            ),
        ];
        for (name, segments) in cases {
            let t = transfer(segments, 8);
            assert!(
                matches!(layout(&t), Err(Error::Transport(_))),
                "{name}: layout accepted"
            );
            let mut rx = vec![0u8; t.len()];
            assert!(
                matches!(descriptors(&t, &mut rx), Err(Error::Transport(_))),
                "{name}: descriptors accepted"
            );
        }
    }

    #[test]
    fn short_receive_buffer_rejected() {
        let t = transfer(vec![Segment::delay(10), Segment::data(0, 6)], 6);
        let mut rx = vec![0u8; 4];
        assert!(matches!(descriptors(&t, &mut rx), Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn open_missing_device_is_unavailable() {
        let result = SpidevBus::open("/dev/spidev-does-not-exist.9", 8_000_000).await;
        assert!(matches!(result, Err(Error::DeviceUnavailable(_))));
    }
}
