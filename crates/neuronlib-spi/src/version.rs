//! Board version block decoding and bus speed selection.
//!
//! Every Neuron board exposes a 5-register version block at register
//! [`VERSION_REGISTER`]:
//!
//! | Offset | Content                                                      |
//! |--------|--------------------------------------------------------------|
//! | 0      | firmware version, major in the high byte                     |
//! | 1      | digital inputs (low byte), digital outputs (high byte)       |
//! | 2      | analog inputs (high byte), analog outputs (bits 4-7), UARTs (bits 0-3) |
//! | 3      | hardware version: board (high byte), major (bits 4-7), calibration (bit 3), minor (bits 0-2) |
//! | 4      | base hardware version, same layout as offset 3               |
//!
//! Firmware before 4.0 packs the hardware revision into the firmware minor
//! byte and keeps the interrupt mask at a different register.

use std::fmt;

/// First register of the version block.
pub const VERSION_REGISTER: u16 = 1000;

/// Number of registers in the version block.
pub const VERSION_REGISTER_COUNT: u16 = 5;

/// Conservative clock rate used until a board has been identified.
pub const DEFAULT_SPEED_HZ: u32 = 8_000_000;

/// Clock rate for boards without a digital isolator on the bus.
pub const FAST_SPEED_HZ: u32 = 12_000_000;

/// Clock rate for the isolated analog board family.
pub const ISOLATED_SPEED_HZ: u32 = 8_000_000;

/// Board code of the isolated 4Ai4Ao family.
const ISOLATED_BOARD: u8 = 0x0B;

/// Interrupt mask register on current firmware.
const INT_MASK_REGISTER: u16 = 1007;

/// Interrupt mask register on firmware before 4.0.
const LEGACY_INT_MASK_REGISTER: u16 = 1003;

/// Firmware major versions below this use the legacy layout.
const LEGACY_FIRMWARE_MAJOR: u8 = 4;

/// Number of user LEDs on boards that have them.
const ULED_COUNT: u16 = 4;

/// Decoded capability and version descriptor of a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardVersion {
    /// Firmware version, major in the high byte.
    pub sw_version: u16,
    /// Hardware version of the board.
    pub hw_version: u16,
    /// Hardware version of the base board.
    pub base_hw_version: u16,
    /// Number of digital inputs.
    pub di_count: u8,
    /// Number of digital outputs.
    pub do_count: u8,
    /// Number of analog inputs.
    pub ai_count: u8,
    /// Number of analog outputs.
    pub ao_count: u8,
    /// Number of UART interfaces.
    pub uart_count: u8,
    /// Number of user LEDs.
    pub uled_count: u16,
    /// Register holding the interrupt mask, or `0` if the board has no
    /// interrupt support.
    pub int_mask_register: u16,
}

impl BoardVersion {
    pub fn sw_major(&self) -> u8 {
        (self.sw_version >> 8) as u8
    }

    pub fn sw_minor(&self) -> u8 {
        (self.sw_version & 0xFF) as u8
    }

    pub fn hw_board(&self) -> u8 {
        hw_board(self.hw_version)
    }

    pub fn hw_major(&self) -> u8 {
        hw_major(self.hw_version)
    }

    pub fn hw_minor(&self) -> u8 {
        (self.hw_version & 0x07) as u8
    }

    /// Returns `true` if the board carries a calibration flag.
    pub fn is_calibration(&self) -> bool {
        self.hw_version & 0x08 != 0
    }

    /// Board code of the base board.
    pub fn base_board(&self) -> u8 {
        hw_board(self.base_hw_version)
    }

    /// Returns `true` if the board raises its interrupt line.
    pub fn has_interrupts(&self) -> bool {
        self.int_mask_register != 0
    }
}

impl fmt::Display for BoardVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "firmware {}.{}, hardware {}.{}",
            self.sw_major(),
            self.sw_minor(),
            self.hw_board(),
            self.hw_major()
        )
    }
}

fn hw_board(hw: u16) -> u8 {
    (hw >> 8) as u8
}

fn hw_major(hw: u16) -> u8 {
    ((hw & 0xF0) >> 4) as u8
}

/// Decode the version block read from [`VERSION_REGISTER`].
///
/// Pure: the same registers always produce the same descriptor.
///
/// # Example
///
/// ```
/// use neuronlib_spi::version::decode_version;
///
/// let version = decode_version(&[0x0401, 0x0408, 0x0032, 0x0000, 0x0000]);
/// assert_eq!(version.sw_major(), 4);
/// assert_eq!(version.di_count, 8);
/// assert_eq!(version.int_mask_register, 1007);
/// ```
pub fn decode_version(registers: &[u16; 5]) -> BoardVersion {
    let mut version = BoardVersion {
        sw_version: registers[0],
        hw_version: registers[3],
        base_hw_version: registers[4],
        di_count: (registers[1] & 0xFF) as u8,
        do_count: (registers[1] >> 8) as u8,
        ai_count: (registers[2] >> 8) as u8,
        ao_count: ((registers[2] & 0xFF) >> 4) as u8,
        uart_count: (registers[2] & 0x0F) as u8,
        uled_count: 0,
        int_mask_register: INT_MASK_REGISTER,
    };

    if version.sw_major() < LEGACY_FIRMWARE_MAJOR {
        let minor = u16::from(version.sw_minor());
        version.hw_version = (minor << 4) | (minor & 0x0F);
        version.sw_version &= 0xFF00;
        version.int_mask_register = LEGACY_INT_MASK_REGISTER;
    } else if version.hw_board() == 0 && version.sw_version != 0x0400 {
        version.uled_count = ULED_COUNT;
    }

    // Early 4Ai4Ao revisions have no interrupt line.
    if hw_board(version.base_hw_version) == ISOLATED_BOARD
        && hw_major(version.base_hw_version) <= 1
    {
        version.int_mask_register = 0;
    }

    version
}

/// Highest safe bus clock rate for a board.
///
/// The isolated 4Ai4Ao family sits behind a digital isolator that limits
/// the bus to 8 MHz; everything else runs at 12 MHz.
pub fn board_speed(version: &BoardVersion) -> u32 {
    if version.base_board() == ISOLATED_BOARD {
        ISOLATED_SPEED_HZ
    } else {
        FAST_SPEED_HZ
    }
}
