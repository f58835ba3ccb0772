//! Input reports, sent from the remote to the host.

use crate::host::{CoreButton, Direction};
use crate::result::{ProtocolError, WiimoteResult};
use bitflags::bitflags;

pub const STATUS_ID: u8 = 0x20;
pub const READ_MEMORY_ID: u8 = 0x21;
pub const ACKNOWLEDGE_ID: u8 = 0x22;

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u8 {
        const BATTERY_LOW = 0b0000_0001;
        const EXTENSION_CONTROLLER_CONNECTED = 0b0000_0010;
        const SPEAKER_ENABLED = 0b0000_0100;
        const IR_CAMERA_ENABLED = 0b0000_1000;
        const LED_1 = 0b0001_0000;
        const LED_2 = 0b0010_0000;
        const LED_3 = 0b0100_0000;
        const LED_4 = 0b1000_0000;
    }
}

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct ButtonData: u16 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
        const DOWN = 1 << 2;
        const UP = 1 << 3;
        const PLUS = 1 << 4;

        const TWO = 1 << 8;
        const ONE = 1 << 9;
        const B = 1 << 10;
        const A = 1 << 11;
        const MINUS = 1 << 12;

        const HOME = 1 << 15;
    }
}

impl ButtonData {
    #[must_use]
    pub const fn from_button(button: CoreButton) -> Self {
        match button {
            CoreButton::A => Self::A,
            CoreButton::B => Self::B,
            CoreButton::One => Self::ONE,
            CoreButton::Two => Self::TWO,
            CoreButton::Minus => Self::MINUS,
            CoreButton::Plus => Self::PLUS,
            CoreButton::Home => Self::HOME,
        }
    }

    /// D-pad bit for a direction. Held sideways the pad is rotated a quarter turn.
    #[must_use]
    pub const fn from_dpad(direction: Direction, sideways: bool) -> Self {
        match (direction, sideways) {
            (Direction::Up, false) | (Direction::Left, true) => Self::UP,
            (Direction::Down, false) | (Direction::Right, true) => Self::DOWN,
            (Direction::Left, false) | (Direction::Down, true) => Self::LEFT,
            (Direction::Right, false) | (Direction::Up, true) => Self::RIGHT,
            _ => Self::empty(),
        }
    }

    #[must_use]
    pub const fn to_bytes(self) -> [u8; 2] {
        self.bits().to_le_bytes()
    }

    #[must_use]
    pub const fn from_bytes(data: [u8; 2]) -> Self {
        Self::from_bits_truncate(u16::from_le_bytes(data))
    }
}

/// Result codes of the acknowledge report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    Success = 0,
    Error = 3,
    InvalidSpace = 6,
    Nack = 7,
    InvalidAddress = 8,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusData {
    pub buttons: ButtonData,
    pub flags: StatusFlags,
    pub battery_level: u8,
}

impl StatusData {
    pub const SIZE: usize = 6;

    /// Returns the core button data.
    #[must_use]
    pub const fn buttons(&self) -> ButtonData {
        self.buttons
    }

    /// Returns the status flags.
    #[must_use]
    pub const fn flags(&self) -> StatusFlags {
        self.flags
    }

    /// Returns the battery level.
    #[must_use]
    pub const fn battery_level(&self) -> u8 {
        self.battery_level
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let buttons = self.buttons.to_bytes();
        [buttons[0], buttons[1], self.flags.bits(), 0, 0, self.battery_level]
    }

    fn from_bytes(data: &[u8]) -> Self {
        Self {
            buttons: ButtonData::from_bytes([data[0], data[1]]),
            flags: StatusFlags::from_bits_retain(data[2]),
            battery_level: data[5],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryData {
    pub buttons: ButtonData,
    size_error_flags: u8,
    address: [u8; 2],
    pub data: [u8; 16],
}

impl MemoryData {
    pub const SIZE: usize = 21;

    /// `size` must be in `1..=16`.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn new(buttons: ButtonData, address: u16, size: usize, error: ErrorCode, data: [u8; 16]) -> Self {
        Self {
            buttons,
            size_error_flags: ((size.clamp(1, 16) as u8 - 1) << 4) | error as u8,
            address: address.to_be_bytes(),
            data,
        }
    }

    /// Returns the core button data.
    #[must_use]
    pub const fn buttons(&self) -> ButtonData {
        self.buttons
    }

    /// Returns the size of the data in bytes.
    #[must_use]
    pub const fn size(&self) -> u8 {
        (self.size_error_flags >> 4) + 1
    }

    /// Returns the error flag.
    ///
    /// Known values:
    /// - 0: No error
    /// - 7: Attempted to read from write-only register or disconnected extension
    /// - 8: Attempted to read from non-existing address
    #[must_use]
    pub const fn error_flag(&self) -> u8 {
        self.size_error_flags & 0x0F
    }

    /// Returns the 2 least significant bytes of the address of the first byte.
    #[must_use]
    pub const fn address_offset(&self) -> u16 {
        u16::from_be_bytes(self.address)
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..2].copy_from_slice(&self.buttons.to_bytes());
        out[2] = self.size_error_flags;
        out[3..5].copy_from_slice(&self.address);
        out[5..].copy_from_slice(&self.data);
        out
    }

    fn from_bytes(data: &[u8]) -> Self {
        let mut memory = [0u8; 16];
        memory.copy_from_slice(&data[5..21]);
        Self {
            buttons: ButtonData::from_bytes([data[0], data[1]]),
            size_error_flags: data[2],
            address: [data[3], data[4]],
            data: memory,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcknowledgeData {
    pub buttons: ButtonData,
    pub report_number: u8,
    pub error_code: u8,
}

impl AcknowledgeData {
    pub const SIZE: usize = 4;

    /// Returns the core button data.
    #[must_use]
    pub const fn buttons(&self) -> ButtonData {
        self.buttons
    }

    /// Returns the report number.
    #[must_use]
    pub const fn report_number(&self) -> u8 {
        self.report_number
    }

    /// Returns the error code.
    #[must_use]
    pub const fn error_code(&self) -> u8 {
        self.error_code
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let buttons = self.buttons.to_bytes();
        [buttons[0], buttons[1], self.report_number, self.error_code]
    }

    fn from_bytes(data: &[u8]) -> Self {
        Self {
            buttons: ButtonData::from_bytes([data[0], data[1]]),
            report_number: data[2],
            error_code: data[3],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WiimoteData {
    pub data: [u8; 21],
}

impl WiimoteData {
    /// Returns the core button data.
    ///
    /// This is invalid for report type 0x3d that only contains extension data.
    #[must_use]
    pub const fn buttons(&self) -> ButtonData {
        let bits = u16::from_le_bytes([self.data[0], self.data[1]]);
        ButtonData::from_bits_truncate(bits)
    }
}

/// An input report represents the data sent from the Wii remote to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputReport {
    /// Status information report (ID 0x20).
    ///
    /// Answer to output report 0x15 and sent unrequested when the extension is
    /// connected or disconnected.
    ///
    /// WiiBrew Documentation: https://www.wiibrew.org/wiki/Wiimote#0x20:_Status
    StatusInformation(StatusData),
    /// Read memory data report (ID 0x21).
    ///
    /// Result of a read memory request (output report ID 0x17).
    ///
    /// WiiBrew Documentation: https://www.wiibrew.org/wiki/Wiimote#0x21:_Read_Memory_Data
    ReadMemory(MemoryData),
    /// Acknowledge report (ID 0x22).
    ///
    /// Sent as a response to an output report with a corresponding result or error.
    ///
    /// WiiBrew Documentation: https://www.wiibrew.org/wiki/Wiimote#0x22:_Acknowledge_output_report.2C_return_function_result
    Acknowledge(AcknowledgeData),
    /// Data report (IDs 0x30-0x3F).
    ///
    /// Contains the data of the buttons, accelerometer, IR and Extension.
    /// The exact layout depends on the reporting mode selected by output report 0x12.
    ///
    /// WiiBrew Documentation: https://www.wiibrew.org/wiki/Wiimote#Data_Reporting
    DataReport(u8, WiimoteData),
}

impl InputReport {
    /// Serializes the report including its id, without the HID header.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(22);
        match self {
            Self::StatusInformation(data) => {
                out.push(STATUS_ID);
                out.extend_from_slice(&data.to_bytes());
            }
            Self::ReadMemory(data) => {
                out.push(READ_MEMORY_ID);
                out.extend_from_slice(&data.to_bytes());
            }
            Self::Acknowledge(data) => {
                out.push(ACKNOWLEDGE_ID);
                out.extend_from_slice(&data.to_bytes());
            }
            Self::DataReport(id, data) => {
                out.push(*id);
                out.extend_from_slice(&data.data);
            }
        }
        out
    }

    fn payload(value: &[u8], size: usize) -> WiimoteResult<&[u8]> {
        if value.len() < size + 1 {
            return Err(ProtocolError::ReportTooShort {
                id: value[0],
                expected: size + 1,
                actual: value.len(),
            }
            .into());
        }
        Ok(&value[1..=size])
    }

    fn from_data_report(value: &[u8]) -> Self {
        const DATA_SIZE: usize = 21;
        let mut data = [0u8; DATA_SIZE];
        let bytes_to_copy = usize::min(value.len() - 1, DATA_SIZE);
        data[..bytes_to_copy].copy_from_slice(&value[1..=bytes_to_copy]);

        Self::DataReport(value[0], WiimoteData { data })
    }
}

impl TryFrom<&[u8]> for InputReport {
    type Error = crate::result::WiimoteError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(ProtocolError::InvalidData.into());
        }
        match value[0] {
            STATUS_ID => Ok(Self::StatusInformation(StatusData::from_bytes(
                Self::payload(value, StatusData::SIZE)?,
            ))),
            READ_MEMORY_ID => Ok(Self::ReadMemory(MemoryData::from_bytes(Self::payload(
                value,
                MemoryData::SIZE,
            )?))),
            ACKNOWLEDGE_ID => Ok(Self::Acknowledge(AcknowledgeData::from_bytes(
                Self::payload(value, AcknowledgeData::SIZE)?,
            ))),
            0x30..=0x3F => Ok(Self::from_data_report(value)),
            _ => Err(ProtocolError::InvalidData.into()),
        }
    }
}
