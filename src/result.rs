use thiserror::Error;

#[derive(Debug, Error)]
pub enum WiimoteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<toml::de::Error> for WiimoteError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for WiimoteError {
    fn from(e: toml::ser::Error) -> Self {
        Self::Config(e.to_string())
    }
}

/// Malformed traffic received from the host. Never fatal, the message is dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("zero sized data on channel {channel}")]
    ZeroSizedPacket { channel: u16 },
    #[error("unexpected HID packet (type 0x{kind:x}, param 0x{param:x})")]
    UnexpectedHidPacket { kind: u8, param: u8 },
    #[error("unknown output report 0x{0:02x}")]
    UnknownOutputReport(u8),
    #[error("report 0x{id:02x} too short: expected {expected} bytes, got {actual}")]
    ReportTooShort {
        id: u8,
        expected: usize,
        actual: usize,
    },
    #[error("invalid reporting mode 0x{0:02x}")]
    InvalidReportingMode(u8),
    #[error("invalid data")]
    InvalidData,
}

pub type WiimoteResult<T> = Result<T, WiimoteError>;
