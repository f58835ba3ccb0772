//! The Wii MotionPlus gyroscope, plugged between the remote and the accessory.
//!
//! https://www.wiibrew.org/wiki/Wiimote/Extension_Controllers/Wii_Motion_Plus

use super::{
    extension_bus_read, extension_bus_write, Extension, ExtensionRegisters, CALIBRATION_OFFSET,
    ENCRYPTION_DISABLED, ENCRYPTION_OFFSET, I2C_ADDR, IDENTIFIER_OFFSET,
};
use crate::calibration::normalize;
use crate::math::Vec3;

/// Address answered while the MotionPlus is not activated.
pub const INACTIVE_I2C_ADDR: u8 = 0x53;
pub const ACTIVE_I2C_ADDR: u8 = I2C_ADDR;

const INACTIVE_IDENTIFIER: [u8; 6] = [0x00, 0x00, 0xA6, 0x20, 0x00, 0x05];
const MODE_OFFSET: u8 = IDENTIFIER_OFFSET + 4;

pub const MODE_ACTIVE: u8 = 0x04;
pub const MODE_NUNCHUK_PASSTHROUGH: u8 = 0x05;
pub const MODE_CLASSIC_PASSTHROUGH: u8 = 0x07;

/// Updates the port stays disconnected while switching modes.
const ACTIVATION_STEPS: u8 = 20;

const CALIBRATION_ZERO: u16 = 0x8000;
const CALIBRATION_DEGREES_DIV_6: u8 = 90;
const CALIBRATION_SCALE: u16 = CALIBRATION_ZERO + 24 * CALIBRATION_DEGREES_DIV_6 as u16;

const UNIT_PER_DEG_PER_S: f64 = 8192.0 / 595.0;
// At high speed (slow bit = 0) raw values read are small with the same deg/s to reach
// higher values on top, so you must multiply it by 2000/440
const HIGH_SPEED_MULTIPLIER: f64 = 2000.0 / 440.0;
const VALUE_ZERO: u16 = 0x2000;
const VALUE_MAX: u16 = 0x3FFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationStatus {
    Inactive,
    Activating,
    Active,
    Deactivating,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MotionPlusCalibration {
    fast: MotionPlusCalibrationData,
    slow: MotionPlusCalibrationData,
}

impl MotionPlusCalibration {
    /// Parses the two calibration blocks read from 0x20, verifying the CRC32 split across them.
    #[must_use]
    pub fn from_bytes(data: &[u8; 32]) -> Option<Self> {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&data[0..14]);
        hasher.update(&data[16..30]);
        let checksum = u32::from_be_bytes([data[14], data[15], data[30], data[31]]);
        if hasher.finalize() != checksum {
            return None;
        }

        let mut fast = [0u8; 16];
        let mut slow = [0u8; 16];
        fast.copy_from_slice(&data[..16]);
        slow.copy_from_slice(&data[16..]);
        Some(Self {
            fast: MotionPlusCalibrationData::from(fast),
            slow: MotionPlusCalibrationData::from(slow),
        })
    }

    /// Factory calibration blocks of the emulated gyroscope.
    #[must_use]
    pub fn factory_bytes() -> [u8; 32] {
        let mut block = [0u8; 16];
        for (i, value) in [CALIBRATION_ZERO; 3]
            .into_iter()
            .chain([CALIBRATION_SCALE; 3])
            .enumerate()
        {
            block[i * 2..i * 2 + 2].copy_from_slice(&value.to_be_bytes());
        }
        block[12] = CALIBRATION_DEGREES_DIV_6;

        let mut data = [0u8; 32];
        data[..16].copy_from_slice(&block);
        data[16..].copy_from_slice(&block);

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&data[0..14]);
        hasher.update(&data[16..30]);
        let checksum = hasher.finalize().to_be_bytes();
        data[14..16].copy_from_slice(&checksum[..2]);
        data[30..32].copy_from_slice(&checksum[2..]);
        data
    }

    /// Returns yaw, roll and pitch in degrees per second.
    #[must_use]
    pub fn get_angular_velocity(&self, data: &MotionPlusData) -> (f64, f64, f64) {
        #[rustfmt::skip]
        let calibration = (
            if data.yaw_slow { &self.slow } else { &self.fast },
            if data.roll_slow { &self.slow } else { &self.fast },
            if data.pitch_slow { &self.slow } else { &self.fast },
        );

        #[rustfmt::skip]
        let mode_multiplier = (
            if data.yaw_slow { 1.0 } else { HIGH_SPEED_MULTIPLIER },
            if data.roll_slow { 1.0 } else { HIGH_SPEED_MULTIPLIER },
            if data.pitch_slow { 1.0 } else { HIGH_SPEED_MULTIPLIER },
        );

        let scale = (
            calibration.0.yaw_scale,
            calibration.1.roll_scale,
            calibration.2.pitch_scale,
        );
        let zero = (
            calibration.0.yaw_zero_value,
            calibration.1.roll_zero_value,
            calibration.2.pitch_zero_value,
        );
        let degrees = (
            f64::from(calibration.0.degrees_div_6) * 6_f64,
            f64::from(calibration.1.degrees_div_6) * 6_f64,
            f64::from(calibration.2.degrees_div_6) * 6_f64,
        );

        let yaw: f64 = normalize(data.yaw, 14, zero.0, scale.0, 16);
        let roll: f64 = normalize(data.roll, 14, zero.1, scale.1, 16);
        let pitch: f64 = normalize(data.pitch, 14, zero.2, scale.2, 16);

        (
            yaw * degrees.0 * mode_multiplier.0 / UNIT_PER_DEG_PER_S,
            roll * degrees.1 * mode_multiplier.1 / UNIT_PER_DEG_PER_S,
            pitch * degrees.2 * mode_multiplier.2 / UNIT_PER_DEG_PER_S,
        )
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct MotionPlusCalibrationData {
    yaw_zero_value: u16,
    roll_zero_value: u16,
    pitch_zero_value: u16,
    yaw_scale: u16,
    roll_scale: u16,
    pitch_scale: u16,
    degrees_div_6: u8,
}

impl From<[u8; 16]> for MotionPlusCalibrationData {
    fn from(value: [u8; 16]) -> Self {
        Self {
            yaw_zero_value: u16::from_be_bytes([value[0], value[1]]),
            roll_zero_value: u16::from_be_bytes([value[2], value[3]]),
            pitch_zero_value: u16::from_be_bytes([value[4], value[5]]),
            yaw_scale: u16::from_be_bytes([value[6], value[7]]),
            roll_scale: u16::from_be_bytes([value[8], value[9]]),
            pitch_scale: u16::from_be_bytes([value[10], value[11]]),
            degrees_div_6: value[12],
        }
    }
}

#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionPlusData {
    pub yaw: u16,
    pub roll: u16,
    pub pitch: u16,
    pub yaw_slow: bool,
    pub roll_slow: bool,
    pub pitch_slow: bool,
    pub extension_connected: bool,
}

impl MotionPlusData {
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 6] {
        let [yaw_hi, yaw_lo] = self.yaw.to_be_bytes();
        let [roll_hi, roll_lo] = self.roll.to_be_bytes();
        let [pitch_hi, pitch_lo] = self.pitch.to_be_bytes();
        [
            yaw_lo,
            roll_lo,
            pitch_lo,
            (yaw_hi << 2) | (u8::from(self.yaw_slow) << 1) | u8::from(self.pitch_slow),
            (roll_hi << 2) | (u8::from(self.roll_slow) << 1) | u8::from(self.extension_connected),
            (pitch_hi << 2) | 0b10,
        ]
    }

    /// Encodes an angular velocity in rad/s, picking the slow range when it fits.
    #[must_use]
    pub fn from_angular_velocity(angular_velocity: Vec3, extension_connected: bool) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let encode = |rad_per_s: f32| -> (u16, bool) {
            let raw = f64::from(rad_per_s).to_degrees() * UNIT_PER_DEG_PER_S;
            let (raw, slow) = if raw.abs() < f64::from(VALUE_ZERO - 1) {
                (raw, true)
            } else {
                (raw / HIGH_SPEED_MULTIPLIER, false)
            };
            let value = (f64::from(VALUE_ZERO) + raw).round().clamp(0.0, f64::from(VALUE_MAX));
            (value as u16, slow)
        };

        let (yaw, yaw_slow) = encode(angular_velocity.z);
        let (roll, roll_slow) = encode(angular_velocity.y);
        let (pitch, pitch_slow) = encode(angular_velocity.x);
        Self {
            yaw,
            roll,
            pitch,
            yaw_slow,
            roll_slow,
            pitch_slow,
            extension_connected,
        }
    }
}

impl TryFrom<[u8; 6]> for MotionPlusData {
    type Error = ();

    fn try_from(value: [u8; 6]) -> Result<Self, Self::Error> {
        // https://www.wiibrew.org/wiki/Wiimote/Extension_Controllers/Wii_Motion_Plus#Nunchuck_pass-through_mode
        // Bit 1 of Byte 5 is used to determine which type of report is received:
        // it is 1 when it contains MotionPlus Data and 0 when it contains extension data.
        let is_motion_plus_data = value[5] & 0b10 == 0b10;
        if !is_motion_plus_data {
            return Err(());
        }

        Ok(Self {
            yaw: u16::from_be_bytes([value[3] >> 2, value[0]]),
            roll: u16::from_be_bytes([value[4] >> 2, value[1]]),
            pitch: u16::from_be_bytes([value[5] >> 2, value[2]]),
            yaw_slow: value[3] & 0b0010 != 0,
            pitch_slow: value[3] & 0b0001 != 0,
            roll_slow: value[4] & 0b0010 != 0,
            extension_connected: value[4] & 0b0001 != 0,
        })
    }
}

/// Nunchuk data squeezed into the pass-through layout, dropping the lowest accelerometer bits.
#[allow(clippy::cast_possible_truncation)]
fn nunchuk_passthrough(data: &[u8]) -> [u8; 6] {
    let az = (u16::from(data[4]) << 2) | u16::from(data[5] >> 6);
    let ax_bit1 = (data[5] >> 3) & 1;
    let ay_bit1 = (data[5] >> 5) & 1;
    let c = (data[5] >> 1) & 1;
    let z = data[5] & 1;
    [
        data[0],
        data[1],
        data[2],
        data[3],
        (((az >> 3) as u8) << 1) | 1,
        ((((az >> 1) & 0b11) as u8) << 6) | (ay_bit1 << 5) | (ax_bit1 << 4) | (c << 3) | (z << 2),
    ]
}

/// Classic Controller data in the pass-through layout, dropping the lowest left stick bits.
fn classic_passthrough(data: &[u8]) -> [u8; 6] {
    let up = data[5] & 1;
    let left = (data[5] >> 1) & 1;
    [
        (data[0] & 0xC0) | (data[0] & 0x3E) | up,
        (data[1] & 0xC0) | (data[1] & 0x3E) | left,
        data[2],
        data[3],
        (data[4] & 0xFE) | 1,
        data[5] & 0xFC,
    ]
}

#[derive(Debug, Clone)]
pub struct MotionPlus {
    registers: ExtensionRegisters,
    status: ActivationStatus,
    progress_timer: u8,
    report_extension: bool,
}

impl Default for MotionPlus {
    fn default() -> Self {
        Self {
            registers: ExtensionRegisters::new(INACTIVE_IDENTIFIER, &MotionPlusCalibration::factory_bytes()),
            status: ActivationStatus::Inactive,
            progress_timer: 0,
            report_extension: false,
        }
    }
}

impl MotionPlus {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub const fn status(&self) -> ActivationStatus {
        self.status
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ActivationStatus::Active
    }

    /// Pass-through mode selected on activation.
    #[must_use]
    pub fn mode(&self) -> u8 {
        self.registers.get(MODE_OFFSET)
    }

    #[must_use]
    pub const fn registers(&self) -> &ExtensionRegisters {
        &self.registers
    }

    fn activate(&mut self, mode: u8) {
        tracing::debug!(mode, "motion plus activating");
        let mut identifier = INACTIVE_IDENTIFIER;
        identifier[2] = 0xA4;
        identifier[4] = mode;
        self.registers.set_identifier(identifier);
        self.registers.set(ENCRYPTION_OFFSET, 0);
        self.status = ActivationStatus::Activating;
        self.progress_timer = ACTIVATION_STEPS;
    }

    fn deactivate(&mut self) {
        tracing::debug!("motion plus deactivating");
        self.registers.set_identifier(INACTIVE_IDENTIFIER);
        self.status = ActivationStatus::Deactivating;
        self.progress_timer = ACTIVATION_STEPS;
    }

    /// Advances a pending mode switch.
    pub fn update(&mut self) {
        if self.progress_timer == 0 {
            return;
        }
        self.progress_timer -= 1;
        if self.progress_timer == 0 {
            self.status = match self.status {
                ActivationStatus::Activating => ActivationStatus::Active,
                ActivationStatus::Deactivating => ActivationStatus::Inactive,
                other => other,
            };
        }
    }

    /// Stores the next report, alternating gyroscope and accessory data in pass-through modes.
    pub fn prepare_input(&mut self, angular_velocity: Vec3, extension: &dyn Extension) {
        if !self.is_active() {
            return;
        }

        let extension_connected = extension.read_device_detect_pin();
        let passthrough = match self.mode() {
            MODE_NUNCHUK_PASSTHROUGH => Some(nunchuk_passthrough as fn(&[u8]) -> [u8; 6]),
            MODE_CLASSIC_PASSTHROUGH => Some(classic_passthrough as fn(&[u8]) -> [u8; 6]),
            _ => None,
        };

        let data = match (passthrough, extension.registers()) {
            (Some(encode), Some(registers)) if extension_connected && self.report_extension => {
                encode(registers.controller_data(6))
            }
            _ => MotionPlusData::from_angular_velocity(angular_velocity, extension_connected).to_bytes(),
        };
        if passthrough.is_some() {
            self.report_extension = !self.report_extension;
        }
        self.registers.set_controller_data(&data);
    }

    #[must_use]
    pub fn read_device_detect_pin(&self, extension: &dyn Extension) -> bool {
        match self.status {
            ActivationStatus::Inactive => extension.read_device_detect_pin(),
            ActivationStatus::Active => true,
            ActivationStatus::Activating | ActivationStatus::Deactivating => false,
        }
    }

    pub fn bus_read(&mut self, extension: &mut dyn Extension, slave_addr: u8, addr: u8, out: &mut [u8]) -> usize {
        match (self.status, slave_addr) {
            (ActivationStatus::Inactive, INACTIVE_I2C_ADDR) => self.registers.read(addr, out),
            (ActivationStatus::Inactive, _) => extension_bus_read(extension, slave_addr, addr, out),
            (ActivationStatus::Active, ACTIVE_I2C_ADDR) => self.registers.read(addr, out),
            _ => 0,
        }
    }

    pub fn bus_write(&mut self, extension: &mut dyn Extension, slave_addr: u8, addr: u8, data: &[u8]) -> usize {
        let byte_at = |offset: u8| {
            offset
                .checked_sub(addr)
                .and_then(|index| data.get(usize::from(index)))
                .copied()
        };

        match (self.status, slave_addr) {
            (ActivationStatus::Inactive, INACTIVE_I2C_ADDR) => {
                let count = self.registers.write(addr, data);
                if let Some(mode @ (MODE_ACTIVE | MODE_NUNCHUK_PASSTHROUGH | MODE_CLASSIC_PASSTHROUGH)) =
                    byte_at(MODE_OFFSET)
                {
                    self.activate(mode);
                }
                count
            }
            (ActivationStatus::Inactive, _) => extension_bus_write(extension, slave_addr, addr, data),
            (ActivationStatus::Active, ACTIVE_I2C_ADDR) => {
                let count = self.registers.write(addr, data);
                if byte_at(ENCRYPTION_OFFSET) == Some(ENCRYPTION_DISABLED) {
                    self.deactivate();
                }
                count
            }
            _ => 0,
        }
    }

    /// Calibration currently exposed on the bus.
    #[must_use]
    pub fn calibration(&self) -> Option<MotionPlusCalibration> {
        let mut data = [0u8; 32];
        for (offset, byte) in (CALIBRATION_OFFSET..).zip(data.iter_mut()) {
            *byte = self.registers.get(offset);
        }
        MotionPlusCalibration::from_bytes(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::{Attachments, ExtensionNumber};
    use crate::math::TAU;
    use crate::testing::TestControls;

    fn settle(motion_plus: &mut MotionPlus) {
        for _ in 0..ACTIVATION_STEPS {
            motion_plus.update();
        }
    }

    #[test]
    fn test_factory_calibration_checksum() {
        let calibration = MotionPlusCalibration::from_bytes(&MotionPlusCalibration::factory_bytes());
        assert!(calibration.is_some());

        let mut corrupted = MotionPlusCalibration::factory_bytes();
        corrupted[3] ^= 0x01;
        assert!(MotionPlusCalibration::from_bytes(&corrupted).is_none());

        assert_eq!(MotionPlus::default().calibration(), calibration);
    }

    #[test]
    fn test_gyro_encoding_roundtrip() {
        let calibration = MotionPlusCalibration::from_bytes(&MotionPlusCalibration::factory_bytes()).unwrap();
        let slow = Vec3::new(TAU / 8.0, -TAU / 16.0, TAU / 4.0);
        let data = MotionPlusData::from_angular_velocity(slow, false);
        assert!(data.yaw_slow && data.roll_slow && data.pitch_slow);

        let decoded = MotionPlusData::try_from(data.to_bytes()).unwrap();
        assert_eq!(decoded, data);
        let (yaw, roll, pitch) = calibration.get_angular_velocity(&decoded);
        assert!((yaw - 90.0).abs() < 0.5);
        assert!((roll + 22.5).abs() < 0.5);
        assert!((pitch - 45.0).abs() < 0.5);

        let fast = MotionPlusData::from_angular_velocity(Vec3::new(0.0, 0.0, TAU * 2.0), true);
        assert!(!fast.yaw_slow);
        assert!(fast.extension_connected);
        let (yaw, _, _) = calibration.get_angular_velocity(&fast);
        assert!((yaw - 720.0).abs() < 2.0);
    }

    #[test]
    fn test_activation_moves_to_extension_address() {
        let mut attachments = Attachments::default();
        let mut motion_plus = MotionPlus::default();
        let extension = attachments.get_mut(ExtensionNumber::None);

        let mut identifier = [0u8; 6];
        assert_eq!(motion_plus.bus_read(extension, INACTIVE_I2C_ADDR, IDENTIFIER_OFFSET, &mut identifier), 6);
        assert_eq!(identifier, INACTIVE_IDENTIFIER);
        assert_eq!(motion_plus.bus_read(extension, ACTIVE_I2C_ADDR, IDENTIFIER_OFFSET, &mut identifier), 0);

        assert_eq!(motion_plus.bus_write(extension, INACTIVE_I2C_ADDR, MODE_OFFSET, &[MODE_ACTIVE]), 1);
        assert_eq!(motion_plus.status(), ActivationStatus::Activating);
        assert!(!motion_plus.read_device_detect_pin(extension));
        settle(&mut motion_plus);

        assert!(motion_plus.is_active());
        assert!(motion_plus.read_device_detect_pin(extension));
        assert_eq!(motion_plus.bus_read(extension, ACTIVE_I2C_ADDR, IDENTIFIER_OFFSET, &mut identifier), 6);
        assert_eq!(identifier, [0x00, 0x00, 0xA4, 0x20, MODE_ACTIVE, 0x05]);
        assert_eq!(motion_plus.bus_read(extension, INACTIVE_I2C_ADDR, IDENTIFIER_OFFSET, &mut identifier), 0);

        assert_eq!(motion_plus.bus_write(extension, ACTIVE_I2C_ADDR, ENCRYPTION_OFFSET, &[ENCRYPTION_DISABLED]), 1);
        settle(&mut motion_plus);
        assert_eq!(motion_plus.status(), ActivationStatus::Inactive);
        assert!(!motion_plus.read_device_detect_pin(extension));
    }

    #[test]
    fn test_inactive_passes_extension_through() {
        let mut attachments = Attachments::default();
        attachments.set_active(ExtensionNumber::Nunchuk);
        let mut motion_plus = MotionPlus::default();
        let extension = attachments.active_mut();

        assert!(motion_plus.read_device_detect_pin(extension));
        let mut identifier = [0u8; 6];
        assert_eq!(motion_plus.bus_read(extension, I2C_ADDR, IDENTIFIER_OFFSET, &mut identifier), 6);
        assert_eq!(identifier, [0x00, 0x00, 0xA4, 0x20, 0x00, 0x00]);
    }

    #[test]
    fn test_nunchuk_passthrough_alternates() {
        let mut attachments = Attachments::default();
        attachments.set_active(ExtensionNumber::Nunchuk);
        let input = TestControls::default();
        attachments.active_mut().prepare_input(&input);

        let mut motion_plus = MotionPlus::default();
        motion_plus.bus_write(
            attachments.active_mut(),
            INACTIVE_I2C_ADDR,
            MODE_OFFSET,
            &[MODE_NUNCHUK_PASSTHROUGH],
        );
        settle(&mut motion_plus);

        let mut kinds = Vec::new();
        for _ in 0..4 {
            motion_plus.prepare_input(Vec3::ZERO, attachments.active());
            let data = motion_plus.registers().controller_data(6);
            kinds.push(data[5] & 0b10 != 0);
            if data[5] & 0b10 == 0 {
                // Stick centered, C and Z released.
                assert_eq!(&data[..2], &[0x80, 0x80]);
                assert_eq!(data[5] & 0b1100, 0b1100);
            }
        }
        assert_eq!(kinds, vec![true, false, true, false]);
    }
}
