//! Protocol function codes.

use std::fmt;

/// Opcode carried in the first byte of every frame.
///
/// The values are fixed wire constants. Several of them borrow Modbus
/// function numbers; the string, character and idle codes are specific to
/// the Neuron firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FunctionCode {
    /// Sentinel for unknown opcodes in a reply.
    Invalid = 0,
    /// Read discrete inputs.
    ReadBit = 1,
    /// Read registers.
    ReadRegister = 4,
    /// Write a single coil.
    WriteBit = 5,
    /// Write registers.
    WriteRegister = 6,
    /// Write consecutive coils.
    WriteBits = 15,
    /// Send one character to a UART.
    WriteCharacter = 65,
    /// Send a string to a UART.
    WriteString = 100,
    /// Read buffered UART input.
    ReadString = 101,
    /// Keep-alive with no side effect.
    Idle = 0xFA,
}

impl FunctionCode {
    /// The wire value.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Decode a wire value, mapping anything unknown to [`FunctionCode::Invalid`].
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => FunctionCode::ReadBit,
            4 => FunctionCode::ReadRegister,
            5 => FunctionCode::WriteBit,
            6 => FunctionCode::WriteRegister,
            15 => FunctionCode::WriteBits,
            65 => FunctionCode::WriteCharacter,
            100 => FunctionCode::WriteString,
            101 => FunctionCode::ReadString,
            0xFA => FunctionCode::Idle,
            _ => FunctionCode::Invalid,
        }
    }

    /// Returns `true` for operations that return data from the board.
    pub fn is_read(self) -> bool {
        matches!(
            self,
            FunctionCode::ReadBit | FunctionCode::ReadRegister | FunctionCode::ReadString
        )
    }

    /// Returns `true` for operations encoded as a fixed 6-byte frame.
    pub fn is_one_phase(self) -> bool {
        matches!(
            self,
            FunctionCode::WriteBit | FunctionCode::WriteCharacter | FunctionCode::Idle
        )
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FunctionCode::Invalid => "Invalid",
            FunctionCode::ReadBit => "ReadBit",
            FunctionCode::ReadRegister => "ReadRegister",
            FunctionCode::WriteBit => "WriteBit",
            FunctionCode::WriteRegister => "WriteRegister",
            FunctionCode::WriteBits => "WriteBits",
            FunctionCode::WriteCharacter => "WriteCharacter",
            FunctionCode::WriteString => "WriteString",
            FunctionCode::ReadString => "ReadString",
            FunctionCode::Idle => "Idle",
        };
        f.write_str(name)
    }
}
