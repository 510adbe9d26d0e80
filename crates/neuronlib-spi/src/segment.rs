//! Transfer segmentation.
//!
//! Turns a message frame into the descriptor list of one atomic bus
//! transfer. Segment 0 always carries only the settling delay. A one-phase
//! frame follows as a single 6-byte segment; a two-phase frame follows as
//! its 4-byte header and then the body (payload and checksum) in chunks of
//! at most [`CHUNK_SIZE`] bytes, contiguous and in order.

use neuronlib_core::bus::{MAX_SEGMENTS, Segment, Transfer};
use neuronlib_core::error::{Error, Result};

use crate::message::{HEADER_LEN, Message, ONE_PHASE_LEN};

/// Largest data segment the bus controller accepts.
pub const CHUNK_SIZE: usize = 64;

/// Chip-select settling pause before data moves, in microseconds.
pub const DEFAULT_SETTLING_DELAY_US: u16 = 10;

/// Lay out the segments for a frame of `frame_len` bytes.
///
/// Fails with [`Error::RequestTooLarge`] if the frame needs more than
/// [`MAX_SEGMENTS`] descriptors.
pub fn plan(frame_len: usize, settling_delay_us: u16) -> Result<Vec<Segment>> {
    let mut segments = vec![Segment::delay(settling_delay_us)];

    if frame_len <= ONE_PHASE_LEN {
        segments.push(Segment::data(0, frame_len));
        return Ok(segments);
    }

    segments.push(Segment::data(0, HEADER_LEN));
    let mut offset = HEADER_LEN;
    while offset < frame_len {
        let len = (frame_len - offset).min(CHUNK_SIZE);
        segments.push(Segment::data(offset, len));
        offset += len;
    }

    if segments.len() > MAX_SEGMENTS {
        return Err(Error::RequestTooLarge(format!(
            "{frame_len}-byte frame needs {} transfer segments, at most {MAX_SEGMENTS} fit",
            segments.len()
        )));
    }
    Ok(segments)
}

/// Check that a frame of `frame_len` bytes fits one atomic transfer.
pub fn check(frame_len: usize) -> Result<()> {
    plan(frame_len, 0).map(|_| ())
}

/// Render `message` into a transfer clocked at `speed_hz`.
pub fn render(message: &Message, settling_delay_us: u16, speed_hz: u32) -> Result<Transfer> {
    let segments = plan(message.frame().len(), settling_delay_us)?;
    Ok(Transfer {
        segments,
        tx: message.frame().clone(),
        speed_hz,
    })
}
