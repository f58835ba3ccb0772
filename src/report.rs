//! Data reports (0x30..=0x3F) and their per-mode layouts.

use crate::calibration::AccelData;
use crate::input::ButtonData;
use crate::result::ProtocolError;

/// HID header of reports sent to the host.
pub const INPUT_REPORT_HEADER: u8 = 0xA1;

/// Payload bytes of the largest data report.
pub const MAX_PAYLOAD_SIZE: usize = 21;

/// Accelerometer bits stored inside the core button bytes.
const CORE_ACCEL_MASK: u16 = 0x6060;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ReportingMode {
    Disabled = 0x00,
    #[default]
    Core = 0x30,
    CoreAccel = 0x31,
    CoreExt8 = 0x32,
    CoreAccelIr12 = 0x33,
    CoreExt19 = 0x34,
    CoreAccelExt16 = 0x35,
    CoreIr10Ext9 = 0x36,
    CoreAccelIr10Ext6 = 0x37,
    Ext21 = 0x3D,
    InterleavedA = 0x3E,
    InterleavedB = 0x3F,
}

impl TryFrom<u8> for ReportingMode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x30 => Self::Core,
            0x31 => Self::CoreAccel,
            0x32 => Self::CoreExt8,
            0x33 => Self::CoreAccelIr12,
            0x34 => Self::CoreExt19,
            0x35 => Self::CoreAccelExt16,
            0x36 => Self::CoreIr10Ext9,
            0x37 => Self::CoreAccelIr10Ext6,
            0x3D => Self::Ext21,
            0x3E => Self::InterleavedA,
            0x3F => Self::InterleavedB,
            _ => return Err(ProtocolError::InvalidReportingMode(value)),
        })
    }
}

/// Sizes of the sub-payloads of a reporting mode, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportLayout {
    pub core: usize,
    pub accel: usize,
    pub ir: usize,
    pub ext: usize,
}

impl ReportLayout {
    const fn new(core: usize, accel: usize, ir: usize, ext: usize) -> Self {
        Self {
            core,
            accel,
            ir,
            ext,
        }
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.core + self.accel + self.ir + self.ext
    }

    #[must_use]
    pub const fn accel_offset(&self) -> usize {
        self.core
    }

    #[must_use]
    pub const fn ir_offset(&self) -> usize {
        self.core + self.accel
    }

    #[must_use]
    pub const fn ext_offset(&self) -> usize {
        self.core + self.accel + self.ir
    }
}

impl ReportingMode {
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    // https://www.wiibrew.org/wiki/Wiimote#Data_Reporting
    #[must_use]
    pub const fn layout(self) -> ReportLayout {
        match self {
            Self::Disabled => ReportLayout::new(0, 0, 0, 0),
            Self::Core => ReportLayout::new(2, 0, 0, 0),
            Self::CoreAccel => ReportLayout::new(2, 3, 0, 0),
            Self::CoreExt8 => ReportLayout::new(2, 0, 0, 8),
            Self::CoreAccelIr12 => ReportLayout::new(2, 3, 12, 0),
            Self::CoreExt19 => ReportLayout::new(2, 0, 0, 19),
            Self::CoreAccelExt16 => ReportLayout::new(2, 3, 0, 16),
            Self::CoreIr10Ext9 => ReportLayout::new(2, 0, 10, 9),
            Self::CoreAccelIr10Ext6 => ReportLayout::new(2, 3, 10, 6),
            Self::Ext21 => ReportLayout::new(0, 0, 0, 21),
            Self::InterleavedA | Self::InterleavedB => ReportLayout::new(2, 1, 18, 0),
        }
    }

    #[must_use]
    pub const fn is_interleaved(self) -> bool {
        matches!(self, Self::InterleavedA | Self::InterleavedB)
    }

    /// The mode following this one, only interleaved modes alternate.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::InterleavedA => Self::InterleavedB,
            Self::InterleavedB => Self::InterleavedA,
            other => other,
        }
    }

    /// Offset of this report's IR bytes inside the camera data block.
    #[must_use]
    pub const fn ir_data_offset(self) -> u8 {
        match self {
            Self::InterleavedB => 18,
            _ => 0,
        }
    }
}

/// Assembles one data report for the active reporting mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataReportBuilder {
    mode: ReportingMode,
    data: [u8; MAX_PAYLOAD_SIZE],
}

impl Default for DataReportBuilder {
    fn default() -> Self {
        Self::new(ReportingMode::Core)
    }
}

impl DataReportBuilder {
    #[must_use]
    pub const fn new(mode: ReportingMode) -> Self {
        Self {
            mode,
            data: [0u8; MAX_PAYLOAD_SIZE],
        }
    }

    #[must_use]
    pub const fn mode(&self) -> ReportingMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ReportingMode) {
        self.mode = mode;
    }

    #[must_use]
    pub const fn layout(&self) -> ReportLayout {
        self.mode.layout()
    }

    #[must_use]
    pub const fn data_size(&self) -> usize {
        self.layout().total()
    }

    #[must_use]
    pub const fn has_core(&self) -> bool {
        self.layout().core != 0
    }

    #[must_use]
    pub const fn has_accel(&self) -> bool {
        self.layout().accel != 0
    }

    #[must_use]
    pub const fn has_ir(&self) -> bool {
        self.layout().ir != 0
    }

    #[must_use]
    pub const fn has_ext(&self) -> bool {
        self.layout().ext != 0
    }

    /// The payload bytes used by the current mode.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data[..self.data_size()]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        let size = self.data_size();
        &mut self.data[..size]
    }

    pub fn ir_data_mut(&mut self) -> &mut [u8] {
        let layout = self.layout();
        &mut self.data[layout.ir_offset()..layout.ext_offset()]
    }

    pub fn ext_data_mut(&mut self) -> &mut [u8] {
        let layout = self.layout();
        &mut self.data[layout.ext_offset()..layout.total()]
    }

    #[must_use]
    pub fn ext_data(&self) -> &[u8] {
        let layout = self.layout();
        &self.data[layout.ext_offset()..layout.total()]
    }

    /// Sets the core buttons, keeping the accelerometer bits sharing their bytes.
    pub fn set_core_buttons(&mut self, buttons: ButtonData) {
        if !self.has_core() {
            return;
        }
        let current = u16::from_le_bytes([self.data[0], self.data[1]]);
        let value = (current & CORE_ACCEL_MASK) | (buttons.bits() & !CORE_ACCEL_MASK);
        self.data[..2].copy_from_slice(&value.to_le_bytes());
    }

    #[must_use]
    pub fn core_buttons(&self) -> ButtonData {
        if !self.has_core() {
            return ButtonData::empty();
        }
        ButtonData::from_bytes([self.data[0], self.data[1]])
    }

    /// Stores a 10-bit sample. Interleaved reports carry x or y plus half of z each.
    #[allow(clippy::cast_possible_truncation)]
    pub fn set_accel_data(&mut self, accel: AccelData) {
        if !self.has_accel() {
            return;
        }
        let offset = self.layout().accel_offset();
        self.data[0] &= !0x60;
        self.data[1] &= !0x60;
        match self.mode {
            ReportingMode::InterleavedA | ReportingMode::InterleavedB => {
                let (value, z_bits) = if self.mode == ReportingMode::InterleavedA {
                    (accel.x, accel.z >> 6)
                } else {
                    (accel.y, accel.z >> 2)
                };
                self.data[offset] = (value >> 2) as u8;
                self.data[0] |= ((z_bits & 0b11) << 5) as u8;
                self.data[1] |= (((z_bits >> 2) & 0b11) << 5) as u8;
            }
            _ => {
                self.data[offset] = (accel.x >> 2) as u8;
                self.data[offset + 1] = (accel.y >> 2) as u8;
                self.data[offset + 2] = (accel.z >> 2) as u8;
                self.data[0] |= ((accel.x & 0b11) << 5) as u8;
                self.data[1] |= (((accel.y >> 1) & 1) << 5) as u8;
                self.data[1] |= (((accel.z >> 1) & 1) << 6) as u8;
            }
        }
    }

    /// Decodes the sample of a non-interleaved report.
    #[must_use]
    pub fn accel_data(&self) -> Option<AccelData> {
        if !self.has_accel() || self.mode.is_interleaved() {
            return None;
        }
        let offset = self.layout().accel_offset();
        let d = &self.data;
        Some(AccelData {
            x: (u16::from(d[offset]) << 2) | u16::from((d[0] >> 5) & 0b11),
            y: (u16::from(d[offset + 1]) << 2) | u16::from((d[1] >> 4) & 0b10),
            z: (u16::from(d[offset + 2]) << 2) | u16::from((d[1] >> 5) & 0b10),
        })
    }

    /// Serializes `[0xA1, id, payload..]` into `out`, returns the length.
    pub fn write_report(&self, out: &mut [u8]) -> usize {
        let size = self.data_size();
        out[0] = INPUT_REPORT_HEADER;
        out[1] = self.mode.id();
        out[2..2 + size].copy_from_slice(self.data());
        size + 2
    }

    #[must_use]
    pub fn to_report(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.data_size() + 2];
        self.write_report(&mut out);
        out
    }
}
