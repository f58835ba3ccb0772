//! Output reports, sent from the host to the remote.

use crate::prelude::*;
use bitflags::bitflags;

pub const RUMBLE_ID: u8 = 0x10;
pub const PLAYER_LED_ID: u8 = 0x11;
pub const DATA_REPORTING_MODE_ID: u8 = 0x12;
pub const IR_CAMERA_ENABLE_ID: u8 = 0x13;
pub const SPEAKER_ENABLE_ID: u8 = 0x14;
pub const STATUS_REQUEST_ID: u8 = 0x15;
pub const WRITE_MEMORY_ID: u8 = 0x16;
pub const READ_MEMORY_ID: u8 = 0x17;
pub const SPEAKER_DATA_ID: u8 = 0x18;
pub const SPEAKER_MUTE_ID: u8 = 0x19;
pub const IR_CAMERA_ENABLE_2_ID: u8 = 0x1A;

const RUMBLE_BIT: u8 = 0x01;
const ACK_BIT: u8 = 0x02;
const ENABLE_BIT: u8 = 0x04;

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct PlayerLedFlags: u8 {
        const LED_1 = 0b0001_0000;
        const LED_2 = 0b0010_0000;
        const LED_3 = 0b0100_0000;
        const LED_4 = 0b1000_0000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataReportingMode {
    pub continuous: bool,
    pub mode: u8,
}

/// Target of a memory access, bits 2-3 of the first payload byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSpace {
    Eeprom,
    I2cBus,
    I2cBusAlt,
    Invalid,
}

impl AddressSpace {
    const fn from_flags(flags: u8) -> Self {
        match (flags >> 2) & 0b11 {
            0 => Self::Eeprom,
            1 => Self::I2cBus,
            2 => Self::I2cBusAlt,
            _ => Self::Invalid,
        }
    }

    const fn flags(self) -> u8 {
        match self {
            Self::Eeprom => 0x00,
            Self::I2cBus => 0x04,
            Self::I2cBusAlt => 0x08,
            Self::Invalid => 0x0C,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addressing {
    pub space: AddressSpace,
    /// 24 bit address.
    pub address: u32,
    pub size: u16,
}

impl Addressing {
    #[must_use]
    pub const fn control_registers(address: u32, size: u16) -> Self {
        Self {
            space: AddressSpace::I2cBus,
            address,
            size,
        }
    }

    #[must_use]
    pub const fn eeprom(address: u32, size: u16) -> Self {
        Self {
            space: AddressSpace::Eeprom,
            address,
            size,
        }
    }

    /// I2C slave selected by a register space address.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub const fn slave_address(&self) -> u8 {
        ((self.address >> 17) & 0x7F) as u8
    }

    /// Register offset inside the slave.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub const fn register(&self) -> u8 {
        self.address as u8
    }

    fn parse(data: &[u8]) -> Self {
        Self {
            space: AddressSpace::from_flags(data[1]),
            address: u32::from_be_bytes([0, data[2], data[3], data[4]]),
            size: 0,
        }
    }
}

/// An output report represents the data sent from the computer to the Wii remote.
///
/// The least significant bit of the first byte of any output report enables or disables the rumble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputReport {
    /// Turn rumble on or off without any other changes.
    ///
    /// WiiBrew Documentation: https://www.wiibrew.org/wiki/Wiimote#Rumble
    Rumble(bool),
    /// Set the player LED lights.
    ///
    /// WiiBrew Documentation: https://www.wiibrew.org/wiki/Wiimote#Player_LEDs
    PlayerLed(PlayerLedFlags),
    /// Set the data reporting mode of the input reports.
    ///
    /// WiiBrew Documentation: https://www.wiibrew.org/wiki/Wiimote#Data_Reporting
    DataReportingMode(DataReportingMode),
    /// Enable or disable the IR camera pixel clock (first step of enable sequence).
    ///
    /// WiiBrew Documentation: https://www.wiibrew.org/wiki/Wiimote#IR_Camera
    IrCameraEnable(bool),
    /// Enable or disable the built-in speaker.
    ///
    /// WiiBrew Documentation: https://www.wiibrew.org/wiki/Wiimote#Speaker
    SpeakerEnable(bool),
    /// Request a status input report from the Wii remote.
    ///
    /// WiiBrew Documentation: https://www.wiibrew.org/wiki/Wiimote#0x20:_Status
    StatusRequest,
    /// Write up to 16 bytes of data to the Wii remote's memory or registers.
    ///
    /// WiiBrew Documentation: https://www.wiibrew.org/wiki/Wiimote#Memory_and_Registers
    WriteMemory(Addressing, [u8; 16]),
    /// Read data from the Wii remote's memory or registers.
    /// The data is returned as `InputReport::ReadMemory` reports in chunks of 16 bytes.
    ///
    /// WiiBrew Documentation: https://www.wiibrew.org/wiki/Wiimote#Memory_and_Registers
    ReadMemory(Addressing),
    /// Send data to the built-in speaker.
    /// The first byte is the length of the data, followed by the actual data.
    ///
    /// WiiBrew Documentation: https://www.wiibrew.org/wiki/Wiimote#Speaker
    SpeakerData(u8, [u8; 20]),
    /// Mute or unmute the built-in speaker.
    ///
    /// WiiBrew Documentation: https://www.wiibrew.org/wiki/Wiimote#Speaker
    SpeakerMute(bool),
    /// Second step of IR camera enable sequence, switches the camera logic.
    ///
    /// WiiBrew Documentation: https://www.wiibrew.org/wiki/Wiimote#IR_Camera
    IrCameraEnable2(bool),
}

/// An output report decoded from the wire together with its common flag bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOutputReport {
    pub report: OutputReport,
    pub rumble: bool,
    /// The host asked for an acknowledge report.
    pub ack: bool,
}

impl OutputReport {
    /// Converts the output report to a byte array.
    /// The rumble flag is used in all output reports to enable or disable the rumble motor.
    ///
    /// Returns a tuple containing the byte array and the actual length of the data.
    #[must_use]
    pub fn to_array(&self, rumble: bool) -> ([u8; WIIMOTE_DEFAULT_REPORT_BUFFER_SIZE], usize) {
        let mut buffer = [0u8; WIIMOTE_DEFAULT_REPORT_BUFFER_SIZE];
        let length = self.fill_buffer(rumble, &mut buffer);
        (buffer, length)
    }

    /// Like [`Self::to_array`] with the acknowledge bit set.
    #[must_use]
    pub fn to_array_with_ack(&self, rumble: bool) -> ([u8; WIIMOTE_DEFAULT_REPORT_BUFFER_SIZE], usize) {
        let (mut buffer, length) = self.to_array(rumble);
        buffer[1] |= ACK_BIT;
        (buffer, length)
    }

    /// Fills an existing buffer with the output report data.
    /// The rumble flag is used in all output reports to enable or disable the rumble motor.
    ///
    /// Returns the actual length of the data.
    pub fn fill_buffer(&self, mut rumble: bool, buffer: &mut [u8]) -> usize {
        const fn enable(flag: bool) -> u8 {
            if flag {
                ENABLE_BIT
            } else {
                0x00
            }
        }

        buffer[1] = 0;
        let length = match self {
            Self::Rumble(rumble_enabled) => {
                rumble = *rumble_enabled;
                buffer[0] = RUMBLE_ID;
                2
            }
            Self::PlayerLed(flags) => {
                buffer[0] = PLAYER_LED_ID;
                buffer[1] = flags.bits();
                2
            }
            Self::DataReportingMode(mode) => {
                buffer[0] = DATA_REPORTING_MODE_ID;
                buffer[1] = enable(mode.continuous);
                buffer[2] = mode.mode;
                3
            }
            Self::IrCameraEnable(flag) => {
                buffer[0] = IR_CAMERA_ENABLE_ID;
                buffer[1] = enable(*flag);
                2
            }
            Self::SpeakerEnable(flag) => {
                buffer[0] = SPEAKER_ENABLE_ID;
                buffer[1] = enable(*flag);
                2
            }
            Self::StatusRequest => {
                buffer[0] = STATUS_REQUEST_ID;
                2
            }
            Self::WriteMemory(addressing, data) => {
                buffer[0] = WRITE_MEMORY_ID;
                buffer[1..=4].copy_from_slice(&addressing.address.to_be_bytes());
                // Address is 3 bytes long, byte 1 is used for the address space and rumble.
                buffer[1] = addressing.space.flags();
                #[allow(clippy::cast_possible_truncation)]
                let size = u16::min(addressing.size, 16) as u8;
                buffer[5] = size;
                buffer[6..=21].copy_from_slice(data);
                22
            }
            Self::ReadMemory(addressing) => {
                buffer[0] = READ_MEMORY_ID;
                buffer[1..=4].copy_from_slice(&addressing.address.to_be_bytes());
                buffer[1] = addressing.space.flags();
                buffer[5..=6].copy_from_slice(&addressing.size.to_be_bytes());
                7
            }
            Self::SpeakerData(length, data) => {
                buffer[0] = SPEAKER_DATA_ID;
                buffer[1] = (*length) << 3;
                buffer[2..=21].copy_from_slice(data);
                22
            }
            Self::SpeakerMute(mute) => {
                buffer[0] = SPEAKER_MUTE_ID;
                buffer[1] = enable(*mute);
                2
            }
            Self::IrCameraEnable2(flag) => {
                buffer[0] = IR_CAMERA_ENABLE_2_ID;
                buffer[1] = enable(*flag);
                2
            }
        };
        if rumble {
            // https://www.wiibrew.org/wiki/Wiimote#Rumble
            // ... the rumble motor can be turned on or off through any of the Output Reports, not just 0x10.
            // Setting the LSB (bit 0) of the first byte of any output report will activate the rumble motor,
            // and unsetting it will deactivate it.
            buffer[1] |= RUMBLE_BIT;
        }
        length
    }

    /// Decodes an output report starting with its id, without the HID header byte.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] for unknown ids, truncated reports and invalid reporting modes.
    pub fn parse(data: &[u8]) -> Result<ParsedOutputReport, ProtocolError> {
        let Some(&id) = data.first() else {
            return Err(ProtocolError::InvalidData);
        };
        let expected = match id {
            DATA_REPORTING_MODE_ID => 3,
            READ_MEMORY_ID => 7,
            WRITE_MEMORY_ID | SPEAKER_DATA_ID => 22,
            RUMBLE_ID..=IR_CAMERA_ENABLE_2_ID => 2,
            _ => return Err(ProtocolError::UnknownOutputReport(id)),
        };
        if data.len() < expected {
            return Err(ProtocolError::ReportTooShort {
                id,
                expected,
                actual: data.len(),
            });
        }

        let flags = data[1];
        let enabled = flags & ENABLE_BIT != 0;
        let report = match id {
            RUMBLE_ID => Self::Rumble(flags & RUMBLE_BIT != 0),
            PLAYER_LED_ID => Self::PlayerLed(PlayerLedFlags::from_bits_truncate(flags)),
            DATA_REPORTING_MODE_ID => {
                if ReportingMode::try_from(data[2]).is_err() {
                    return Err(ProtocolError::InvalidReportingMode(data[2]));
                }
                Self::DataReportingMode(DataReportingMode {
                    continuous: enabled,
                    mode: data[2],
                })
            }
            IR_CAMERA_ENABLE_ID => Self::IrCameraEnable(enabled),
            SPEAKER_ENABLE_ID => Self::SpeakerEnable(enabled),
            STATUS_REQUEST_ID => Self::StatusRequest,
            WRITE_MEMORY_ID => {
                let mut addressing = Addressing::parse(data);
                addressing.size = u16::from(data[5]);
                let mut payload = [0u8; 16];
                payload.copy_from_slice(&data[6..22]);
                Self::WriteMemory(addressing, payload)
            }
            READ_MEMORY_ID => {
                let mut addressing = Addressing::parse(data);
                addressing.size = u16::from_be_bytes([data[5], data[6]]);
                Self::ReadMemory(addressing)
            }
            SPEAKER_DATA_ID => {
                let mut payload = [0u8; 20];
                payload.copy_from_slice(&data[2..22]);
                Self::SpeakerData(flags >> 3, payload)
            }
            SPEAKER_MUTE_ID => Self::SpeakerMute(enabled),
            _ => Self::IrCameraEnable2(enabled),
        };

        Ok(ParsedOutputReport {
            report,
            rumble: flags & RUMBLE_BIT != 0,
            ack: flags & ACK_BIT != 0,
        })
    }
}
