//! Protocol messages: request construction and reply validation.
//!
//! A [`Message`] is built once, with its transmit frame derived at
//! construction time, and never changes afterwards. Construction enforces
//! every size ceiling, so a message that exists can always be rendered
//! into a single atomic bus transfer.
//!
//! # Frame layouts
//!
//! All multi-byte fields are little-endian.
//!
//! One-phase (6 bytes), used by `WriteBit`, `WriteCharacter` and `Idle`:
//!
//! ```text
//! +------+------+---------+---------+---------+---------+
//! | op   | arg  | word lo | word hi | crc lo  | crc hi  |
//! +------+------+---------+---------+---------+---------+
//! ```
//!
//! Two-phase, used by everything else:
//!
//! ```text
//! +------+-------+---------+---------+-------------+--------+--------+
//! | op   | count | addr lo | addr hi | payload ... | crc lo | crc hi |
//! +------+-------+---------+---------+-------------+--------+--------+
//! ```
//!
//! The checksum covers every byte before it. Read requests carry a payload
//! of zeros the size of the expected answer; the board clocks its reply
//! frame back in during the same transfer.

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use neuronlib_core::error::{Error, Result};

use crate::crc::checksum;
use crate::function::FunctionCode;
use crate::reply::Reply;
use crate::segment;

/// Length of a one-phase frame.
pub const ONE_PHASE_LEN: usize = 6;

/// Length of a two-phase header.
pub const HEADER_LEN: usize = 4;

/// Length of the checksum trailer.
pub const CRC_LEN: usize = 2;

/// Largest item count the one-byte count field can carry.
pub const MAX_COUNT: u16 = 255;

/// Largest number of registers in one `WriteRegister` message.
pub const MAX_WRITE_REGISTERS: usize = 126;

/// Largest UART string in one `WriteString` or `ReadString` message.
pub const MAX_STRING_LEN: usize = 240;

/// Per-message deadline used unless overridden.
pub const DEFAULT_MESSAGE_TIMEOUT: Duration = Duration::from_millis(100);

/// Word carried by the keep-alive frame.
const IDLE_WORD: u16 = 0x0E55;

/// What a message asks the board to do with its items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Read this many items.
    Count(u16),
    /// Write these 16-bit values.
    Values(Vec<u16>),
    /// Write these coil states.
    Bits(Vec<bool>),
    /// Write these raw bytes.
    Bytes(Bytes),
}

/// An immutable protocol request.
#[derive(Debug, Clone)]
pub struct Message {
    function: FunctionCode,
    address: u16,
    payload: Payload,
    frame: Bytes,
    timeout: Duration,
}

impl Message {
    /// Build a read of `count` items starting at `address`.
    ///
    /// `function` must be `ReadRegister`, `ReadBit` or `ReadString`. The
    /// count must be non-zero and fit the count field and the transfer
    /// descriptor limit.
    pub fn read(function: FunctionCode, address: u16, count: u16) -> Result<Self> {
        if !function.is_read() {
            return Err(Error::InvalidParameter(format!(
                "{function} is not a read operation"
            )));
        }
        check_count(count)?;
        if function == FunctionCode::ReadString && usize::from(count) > MAX_STRING_LEN {
            return Err(Error::RequestTooLarge(format!(
                "{count} bytes exceeds the string limit of {MAX_STRING_LEN}"
            )));
        }

        let body = vec![0u8; payload_len(function, count)];
        Self::two_phase(function, address, count, Payload::Count(count), &body)
    }

    /// Build a write of a single value.
    ///
    /// `WriteBit` and `WriteCharacter` produce one-phase frames: for
    /// `WriteBit` the address must fit in one byte and any non-zero value
    /// sets the coil; for `WriteCharacter` the address is the UART register
    /// and the value the character. `WriteRegister` produces a two-phase
    /// frame with one value.
    pub fn write_one(function: FunctionCode, address: u16, value: u16) -> Result<Self> {
        match function {
            FunctionCode::WriteBit => {
                let arg = u8::try_from(address).map_err(|_| {
                    Error::InvalidParameter(format!(
                        "bit address {address} does not fit a one-phase frame"
                    ))
                })?;
                let word = u16::from(value != 0);
                Ok(Self::one_phase(
                    function,
                    address,
                    Payload::Values(vec![word]),
                    arg,
                    word,
                ))
            }
            FunctionCode::WriteCharacter => {
                let ch = u8::try_from(value).map_err(|_| {
                    Error::InvalidParameter(format!("character {value:#06X} is not a byte"))
                })?;
                Ok(Self::one_phase(
                    function,
                    address,
                    Payload::Values(vec![value]),
                    ch,
                    address,
                ))
            }
            FunctionCode::WriteRegister => Self::write_many(function, address, &[value]),
            other => Err(Error::InvalidParameter(format!(
                "{other} is not a single-value write"
            ))),
        }
    }

    /// Build a write of consecutive values starting at `address`.
    ///
    /// `WriteRegister` accepts at most [`MAX_WRITE_REGISTERS`] values;
    /// `WriteBits` treats every non-zero value as a set coil.
    pub fn write_many(function: FunctionCode, address: u16, values: &[u16]) -> Result<Self> {
        match function {
            FunctionCode::WriteRegister => {
                if values.is_empty() {
                    return Err(Error::InvalidParameter("no registers to write".into()));
                }
                if values.len() > MAX_WRITE_REGISTERS {
                    return Err(Error::RequestTooLarge(format!(
                        "{} registers exceeds the limit of {MAX_WRITE_REGISTERS}",
                        values.len()
                    )));
                }
                let mut body = BytesMut::with_capacity(values.len() * 2);
                for value in values {
                    body.put_u16_le(*value);
                }
                Self::two_phase(
                    function,
                    address,
                    values.len() as u16,
                    Payload::Values(values.to_vec()),
                    &body,
                )
            }
            FunctionCode::WriteBits => {
                let bits: Vec<bool> = values.iter().map(|v| *v != 0).collect();
                Self::write_bits(address, &bits)
            }
            other => Err(Error::InvalidParameter(format!(
                "{other} is not a multi-value write"
            ))),
        }
    }

    /// Build a `WriteBits` message setting consecutive coils.
    ///
    /// Bits are packed least significant first, eight to a byte.
    pub fn write_bits(address: u16, bits: &[bool]) -> Result<Self> {
        let count = count_of(bits.len(), "bits")?;
        let body = pack_bits(bits);
        Self::two_phase(
            FunctionCode::WriteBits,
            address,
            count,
            Payload::Bits(bits.to_vec()),
            &body,
        )
    }

    /// Build a `WriteString` message sending `data` to the UART at
    /// `uart_address`.
    pub fn write_string(uart_address: u16, data: &[u8]) -> Result<Self> {
        if data.len() > MAX_STRING_LEN {
            return Err(Error::RequestTooLarge(format!(
                "{} bytes exceeds the string limit of {MAX_STRING_LEN}",
                data.len()
            )));
        }
        let count = count_of(data.len(), "bytes")?;
        Self::two_phase(
            FunctionCode::WriteString,
            uart_address,
            count,
            Payload::Bytes(Bytes::copy_from_slice(data)),
            data,
        )
    }

    /// Build the keep-alive frame.
    pub fn idle() -> Self {
        Self::one_phase(
            FunctionCode::Idle,
            0,
            Payload::Values(vec![IDLE_WORD]),
            0,
            IDLE_WORD,
        )
    }

    /// Replace the per-message deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn one_phase(
        function: FunctionCode,
        address: u16,
        payload: Payload,
        arg: u8,
        word: u16,
    ) -> Self {
        Message {
            function,
            address,
            payload,
            frame: encode_one_phase(function, arg, word),
            timeout: DEFAULT_MESSAGE_TIMEOUT,
        }
    }

    fn two_phase(
        function: FunctionCode,
        address: u16,
        count: u16,
        payload: Payload,
        body: &[u8],
    ) -> Result<Self> {
        let frame = encode_two_phase(function, count as u8, address, body);
        segment::check(frame.len())?;
        Ok(Message {
            function,
            address,
            payload,
            frame,
            timeout: DEFAULT_MESSAGE_TIMEOUT,
        })
    }

    pub fn function(&self) -> FunctionCode {
        self.function
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The transmit frame.
    pub fn frame(&self) -> &Bytes {
        &self.frame
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns `true` if the frame is a fixed 6-byte frame.
    pub fn is_one_phase(&self) -> bool {
        self.function.is_one_phase()
    }

    /// Number of items this message reads or writes.
    pub fn count(&self) -> u16 {
        match &self.payload {
            Payload::Count(n) => *n,
            Payload::Values(v) => v.len() as u16,
            Payload::Bits(b) => b.len() as u16,
            Payload::Bytes(b) => b.len() as u16,
        }
    }

    /// Validate the bytes clocked in for this message and extract the reply.
    ///
    /// One-phase replies are accepted when the opcode matches. Two-phase
    /// replies must carry a valid checksum first; then the opcode must
    /// match and, for reads, the address must match and the returned item
    /// count may not exceed the requested one.
    pub fn parse_reply(&self, rx: &[u8]) -> Result<Reply> {
        if rx.len() != self.frame.len() {
            return Err(Error::Protocol(format!(
                "reply is {} bytes, expected {}",
                rx.len(),
                self.frame.len()
            )));
        }

        if self.is_one_phase() {
            self.check_function(rx[0])?;
            return Ok(Reply::new(self.function, self.address, 0, Bytes::new()));
        }

        let split = rx.len() - CRC_LEN;
        let expected = checksum(&rx[..split], 0);
        let received = u16::from_le_bytes([rx[split], rx[split + 1]]);
        if expected != received {
            return Err(Error::Protocol(format!(
                "checksum mismatch: computed {expected:#06X}, received {received:#06X}"
            )));
        }

        self.check_function(rx[0])?;
        let count = u16::from(rx[1]);
        let address = u16::from_le_bytes([rx[2], rx[3]]);

        if !self.function.is_read() {
            return Ok(Reply::new(self.function, address, count, Bytes::new()));
        }

        if address != self.address {
            return Err(Error::Protocol(format!(
                "reply address {address} does not match request address {}",
                self.address
            )));
        }
        if count > self.count() {
            return Err(Error::Protocol(format!(
                "reply carries {count} items, requested {}",
                self.count()
            )));
        }

        let len = payload_len(self.function, count);
        let data = Bytes::copy_from_slice(&rx[HEADER_LEN..HEADER_LEN + len]);
        Ok(Reply::new(self.function, address, count, data))
    }

    fn check_function(&self, code: u8) -> Result<()> {
        let function = FunctionCode::from_code(code);
        if function != self.function {
            return Err(Error::Protocol(format!(
                "reply function {function} ({code:#04X}) does not match request {}",
                self.function
            )));
        }
        Ok(())
    }
}

/// Encode a one-phase frame.
pub(crate) fn encode_one_phase(function: FunctionCode, arg: u8, word: u16) -> Bytes {
    let mut buf = BytesMut::with_capacity(ONE_PHASE_LEN);
    buf.put_u8(function.code());
    buf.put_u8(arg);
    buf.put_u16_le(word);
    let crc = checksum(&buf, 0);
    buf.put_u16_le(crc);
    buf.freeze()
}

/// Encode a two-phase frame: header, payload, checksum.
pub(crate) fn encode_two_phase(
    function: FunctionCode,
    count: u8,
    address: u16,
    payload: &[u8],
) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len() + CRC_LEN);
    buf.put_u8(function.code());
    buf.put_u8(count);
    buf.put_u16_le(address);
    buf.put_slice(payload);
    let crc = checksum(&buf, 0);
    buf.put_u16_le(crc);
    buf.freeze()
}

/// Payload bytes occupied by `count` items of `function`.
fn payload_len(function: FunctionCode, count: u16) -> usize {
    let count = usize::from(count);
    match function {
        FunctionCode::ReadRegister | FunctionCode::WriteRegister => count * 2,
        FunctionCode::ReadBit | FunctionCode::WriteBits => count.div_ceil(8),
        _ => count,
    }
}

fn check_count(count: u16) -> Result<()> {
    if count == 0 {
        return Err(Error::InvalidParameter(
            "item count must not be zero".into(),
        ));
    }
    if count > MAX_COUNT {
        return Err(Error::RequestTooLarge(format!(
            "{count} items exceeds the count field limit of {MAX_COUNT}"
        )));
    }
    Ok(())
}

fn count_of(len: usize, what: &str) -> Result<u16> {
    if len == 0 {
        return Err(Error::InvalidParameter(format!("no {what} to write")));
    }
    if len > usize::from(MAX_COUNT) {
        return Err(Error::RequestTooLarge(format!(
            "{len} {what} exceeds the count field limit of {MAX_COUNT}"
        )));
    }
    Ok(len as u16)
}

fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut packed = vec![0u8; bits.len().div_ceil(8)];
    for (i, bit) in bits.iter().enumerate() {
        if *bit {
            packed[i / 8] |= 1 << (i % 8);
        }
    }
    packed
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // One-phase frames
    // -----------------------------------------------------------------------

    #[test]
    fn write_bit_frame() {
        let msg = Message::write_one(FunctionCode::WriteBit, 5, 1).unwrap();
        assert_eq!(&msg.frame()[..], &[0x05, 0x05, 0x01, 0x00, 0xC2, 0x47]);
        assert!(msg.is_one_phase());
        assert_eq!(msg.timeout(), DEFAULT_MESSAGE_TIMEOUT);
    }

    #[test]
    fn write_bit_normalizes_value() {
        let on = Message::write_one(FunctionCode::WriteBit, 5, 0x1234).unwrap();
        assert_eq!(&on.frame()[..4], &[0x05, 0x05, 0x01, 0x00]);

        let off = Message::write_one(FunctionCode::WriteBit, 5, 0).unwrap();
        assert_eq!(&off.frame()[..4], &[0x05, 0x05, 0x00, 0x00]);
        assert_eq!(
            u16::from_le_bytes([off.frame()[4], off.frame()[5]]),
            checksum(&off.frame()[..4], 0)
        );
    }

    #[test]
    fn write_bit_address_must_fit_byte() {
        assert!(Message::write_one(FunctionCode::WriteBit, 255, 1).is_ok());
        let err = Message::write_one(FunctionCode::WriteBit, 256, 1).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn write_character_frame() {
        let msg =
            Message::write_one(FunctionCode::WriteCharacter, 0x01F4, u16::from(b'A')).unwrap();
        assert_eq!(&msg.frame()[..4], &[65, b'A', 0xF4, 0x01]);

        let err = Message::write_one(FunctionCode::WriteCharacter, 0, 0x100).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn idle_frame() {
        let msg = Message::idle();
        assert_eq!(&msg.frame()[..], &[0xFA, 0x00, 0x55, 0x0E, 0xB6, 0x0A]);
    }

    #[test]
    fn write_one_register_is_two_phase() {
        let msg = Message::write_one(FunctionCode::WriteRegister, 1000, 0xBEEF).unwrap();
        assert!(!msg.is_one_phase());
        assert_eq!(&msg.frame()[..6], &[0x06, 0x01, 0xE8, 0x03, 0xEF, 0xBE]);
        assert_eq!(msg.frame().len(), 8);
    }

    #[test]
    fn frame_shape_follows_function_code() {
        let messages = [
            Message::write_one(FunctionCode::WriteBit, 5, 1).unwrap(),
            Message::write_one(FunctionCode::WriteCharacter, 0, u16::from(b'A')).unwrap(),
            Message::idle(),
            Message::write_one(FunctionCode::WriteRegister, 1000, 0xBEEF).unwrap(),
            Message::read(FunctionCode::ReadBit, 0, 1).unwrap(),
            Message::write_bits(0, &[true]).unwrap(),
        ];
        for msg in &messages {
            assert_eq!(
                msg.is_one_phase(),
                msg.function().is_one_phase(),
                "{}",
                msg.function()
            );
            assert_eq!(
                msg.is_one_phase(),
                msg.frame().len() == ONE_PHASE_LEN,
                "{}",
                msg.function()
            );
        }
    }

    #[test]
    fn write_one_rejects_reads() {
        let err = Message::write_one(FunctionCode::ReadRegister, 0, 1).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    // -----------------------------------------------------------------------
    // Two-phase frames
    // -----------------------------------------------------------------------

    #[test]
    fn read_register_frame() {
        let msg = Message::read(FunctionCode::ReadRegister, 1000, 5).unwrap();
        let frame = msg.frame();
        assert_eq!(frame.len(), 4 + 10 + 2);
        assert_eq!(&frame[..4], &[0x04, 0x05, 0xE8, 0x03]);
        assert!(frame[4..14].iter().all(|b| *b == 0));
        assert_eq!(&frame[14..], &[0x96, 0x6E]);
        assert_eq!(msg.payload(), &Payload::Count(5));
    }

    #[test]
    fn read_bit_payload_rounds_up() {
        let msg = Message::read(FunctionCode::ReadBit, 0, 9).unwrap();
        assert_eq!(msg.frame().len(), 4 + 2 + 2);
    }

    #[test]
    fn read_rejects_zero_and_oversized_counts() {
        assert!(matches!(
            Message::read(FunctionCode::ReadRegister, 0, 0),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            Message::read(FunctionCode::ReadBit, 0, 256),
            Err(Error::RequestTooLarge(_))
        ));
        assert!(matches!(
            Message::read(FunctionCode::WriteRegister, 0, 1),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn read_register_limited_by_segments() {
        // 159 registers make a 320-byte body: five 64-byte chunks.
        assert!(Message::read(FunctionCode::ReadRegister, 0, 159).is_ok());
        assert!(matches!(
            Message::read(FunctionCode::ReadRegister, 0, 160),
            Err(Error::RequestTooLarge(_))
        ));
    }

    #[test]
    fn write_registers_frame() {
        let msg =
            Message::write_many(FunctionCode::WriteRegister, 0x0102, &[0x1122, 0x3344]).unwrap();
        let frame = msg.frame();
        assert_eq!(
            &frame[..8],
            &[0x06, 0x02, 0x02, 0x01, 0x22, 0x11, 0x44, 0x33]
        );
        let crc = checksum(&frame[..8], 0);
        assert_eq!(&frame[8..], &crc.to_le_bytes());
        assert_eq!(msg.count(), 2);
    }

    #[test]
    fn write_registers_ceiling() {
        let ok = vec![0u16; MAX_WRITE_REGISTERS];
        assert!(Message::write_many(FunctionCode::WriteRegister, 0, &ok).is_ok());

        let too_many = vec![0u16; MAX_WRITE_REGISTERS + 1];
        assert!(matches!(
            Message::write_many(FunctionCode::WriteRegister, 0, &too_many),
            Err(Error::RequestTooLarge(_))
        ));
        assert!(matches!(
            Message::write_many(FunctionCode::WriteRegister, 0, &[]),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn write_bits_packs_lsb_first() {
        let bits = [true, false, true, true, false, false, false, false, true];
        let msg = Message::write_bits(16, &bits).unwrap();
        assert_eq!(
            &msg.frame()[..6],
            &[0x0F, 0x09, 0x10, 0x00, 0b0000_1101, 0b0000_0001]
        );
        assert_eq!(msg.frame().len(), 8);
    }

    #[test]
    fn write_many_bits_delegates() {
        let a = Message::write_many(FunctionCode::WriteBits, 3, &[1, 0, 7]).unwrap();
        let b = Message::write_bits(3, &[true, false, true]).unwrap();
        assert_eq!(a.frame(), b.frame());
    }

    #[test]
    fn write_bits_limits() {
        assert!(Message::write_bits(0, &[true; 255]).is_ok());
        assert!(matches!(
            Message::write_bits(0, &[true; 256]),
            Err(Error::RequestTooLarge(_))
        ));
        assert!(matches!(
            Message::write_bits(0, &[]),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn string_limits() {
        assert!(Message::write_string(500, &[b'x'; MAX_STRING_LEN]).is_ok());
        assert!(matches!(
            Message::write_string(500, &[b'x'; MAX_STRING_LEN + 1]),
            Err(Error::RequestTooLarge(_))
        ));
        assert!(Message::read(FunctionCode::ReadString, 500, 240).is_ok());
        assert!(matches!(
            Message::read(FunctionCode::ReadString, 500, 241),
            Err(Error::RequestTooLarge(_))
        ));
    }

    #[test]
    fn write_string_frame() {
        let msg = Message::write_string(0x01F4, b"hi").unwrap();
        assert_eq!(&msg.frame()[..6], &[100, 2, 0xF4, 0x01, b'h', b'i']);
    }

    #[test]
    fn with_timeout_overrides_deadline() {
        let msg = Message::idle().with_timeout(Duration::from_millis(5));
        assert_eq!(msg.timeout(), Duration::from_millis(5));
    }

    // -----------------------------------------------------------------------
    // Reply validation
    // -----------------------------------------------------------------------

    #[test]
    fn one_phase_echo_is_accepted() {
        let msg = Message::write_one(FunctionCode::WriteBit, 5, 1).unwrap();
        let reply = msg.parse_reply(&msg.frame().clone()).unwrap();
        assert_eq!(reply.function(), FunctionCode::WriteBit);
        assert_eq!(reply.address(), 5);
    }

    #[test]
    fn one_phase_wrong_opcode_is_protocol_error() {
        let msg = Message::write_one(FunctionCode::WriteBit, 5, 1).unwrap();
        let err = msg.parse_reply(&[0x00, 0x05, 0x01, 0x00, 0xC2, 0x47]).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn wrong_length_is_protocol_error() {
        let msg = Message::idle();
        assert!(matches!(msg.parse_reply(&[0xFA]), Err(Error::Protocol(_))));
    }

    #[test]
    fn read_reply_decodes_registers() {
        let msg = Message::read(FunctionCode::ReadRegister, 1000, 5).unwrap();
        let rx = [
            0x04, 0x05, 0xE8, 0x03, 0x01, 0x04, 0x08, 0x04, 0x32, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x9B, 0xB9,
        ];
        let reply = msg.parse_reply(&rx).unwrap();
        assert_eq!(reply.count(), 5);
        assert_eq!(reply.registers(), vec![0x0401, 0x0408, 0x0032, 0, 0]);
    }

    #[test]
    fn read_reply_bad_checksum() {
        let msg = Message::read(FunctionCode::ReadRegister, 1000, 1).unwrap();
        let mut rx = encode_two_phase(FunctionCode::ReadRegister, 1, 1000, &[1, 2]).to_vec();
        rx[4] ^= 0xFF;
        let err = msg.parse_reply(&rx).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn read_reply_checksum_checked_before_opcode() {
        let msg = Message::read(FunctionCode::ReadRegister, 1000, 1).unwrap();
        let mut rx = encode_two_phase(FunctionCode::ReadBit, 1, 1000, &[1, 2]).to_vec();
        rx[7] ^= 0x01;
        let err = msg.parse_reply(&rx).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn read_reply_wrong_opcode() {
        let msg = Message::read(FunctionCode::ReadRegister, 1000, 1).unwrap();
        let rx = encode_two_phase(FunctionCode::ReadBit, 1, 1000, &[1, 2]);
        let err = msg.parse_reply(&rx).unwrap_err();
        assert!(err.to_string().contains("does not match request"));
    }

    #[test]
    fn read_reply_wrong_address() {
        let msg = Message::read(FunctionCode::ReadRegister, 1000, 1).unwrap();
        let rx = encode_two_phase(FunctionCode::ReadRegister, 1, 1001, &[1, 2]);
        let err = msg.parse_reply(&rx).unwrap_err();
        assert!(err.to_string().contains("address"));
    }

    #[test]
    fn read_reply_count_above_request() {
        let msg = Message::read(FunctionCode::ReadString, 500, 2).unwrap();
        let rx = encode_two_phase(FunctionCode::ReadString, 3, 500, b"ab");
        assert!(matches!(msg.parse_reply(&rx), Err(Error::Protocol(_))));
    }

    #[test]
    fn read_string_reply_may_be_short() {
        let msg = Message::read(FunctionCode::ReadString, 500, 4).unwrap();
        let rx = encode_two_phase(FunctionCode::ReadString, 2, 500, b"ok\0\0");
        let reply = msg.parse_reply(&rx).unwrap();
        assert_eq!(reply.bytes(), b"ok");
    }

    #[test]
    fn write_reply_ignores_address() {
        let msg = Message::write_many(FunctionCode::WriteRegister, 10, &[1]).unwrap();
        let rx = encode_two_phase(FunctionCode::WriteRegister, 1, 11, &[1, 0]);
        assert!(msg.parse_reply(&rx).is_ok());
    }

    #[test]
    fn read_bits_reply() {
        let msg = Message::read(FunctionCode::ReadBit, 0, 10).unwrap();
        let rx = encode_two_phase(FunctionCode::ReadBit, 10, 0, &[0b1000_0001, 0b10]);
        let reply = msg.parse_reply(&rx).unwrap();
        assert_eq!(
            reply.bits(),
            vec![true, false, false, false, false, false, false, true, false, true]
        );
    }
}
