#![allow(clippy::module_name_repetitions)]

pub mod bus;
pub mod calibration;
pub mod camera;
pub mod config;
mod device;
pub mod dynamics;
pub mod eeprom;
pub mod extensions;
pub mod host;
pub mod input;
mod manager;
pub mod math;
pub mod output;
pub mod primehack;
pub mod report;
mod result;
pub mod speaker;

#[cfg(test)]
mod testing;

pub const WIIMOTE_DEFAULT_REPORT_BUFFER_SIZE: usize = 32;

/// Rate at which [`prelude::Wiimote::update`] is expected to be called, in Hz.
pub const UPDATE_FREQ: u32 = 200;

pub mod prelude {
    pub use crate::config::{PrimeHackSettings, WiimoteConfig};
    pub use crate::device::{Wiimote, WiimoteState, DISCONNECT_CONTROL_CHANNEL};
    pub use crate::extensions::motion_plus::*;
    pub use crate::extensions::ExtensionNumber;
    pub use crate::host::{
        Control, ControlSource, EepromStore, FileEepromStore, HostInterface, HostReport,
        NoReplay, NullEepromStore, ReplaySource, ReportSink,
    };
    pub use crate::manager::{TickerHandle, WiimoteManager, MAX_WIIMOTES};
    pub use crate::report::{DataReportBuilder, ReportingMode};
    pub use crate::result::*;
    pub use crate::WIIMOTE_DEFAULT_REPORT_BUFFER_SIZE;
}
