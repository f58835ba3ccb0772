use super::{Extension, ExtensionNumber, ExtensionRegisters};
use crate::calibration::{convert_accel_data, update_calibration_checksum, AccelData};
use crate::dynamics::{
    directional_input, emulate_shake, emulate_swing, emulate_tilt, shake_input, MotionState,
    RotationalState, ShakeState,
};
use crate::host::{Control, ControlSource, NunchukControl};
use crate::math::{to_unsigned_axis, Matrix33, Vec3, GRAVITY_ACCELERATION};
use crate::UPDATE_FREQ;

const IDENTIFIER: [u8; 6] = [0x00, 0x00, 0xA4, 0x20, 0x00, 0x00];

const ACCEL_ZERO_G: u16 = 0x80;
const ACCEL_ONE_G: u16 = 0xB3;
const STICK_CENTER: u8 = 0x80;
const STICK_RADIUS: u8 = 0x7F;

const BUTTON_Z: u8 = 0x01;
const BUTTON_C: u8 = 0x02;

fn control(control: NunchukControl) -> Control {
    Control::Nunchuk(control)
}

#[derive(Debug, Clone)]
pub struct Nunchuk {
    registers: ExtensionRegisters,
    swing: MotionState,
    tilt: RotationalState,
    shake: ShakeState,
    accel: AccelData,
}

impl Default for Nunchuk {
    fn default() -> Self {
        let mut nunchuk = Self {
            registers: ExtensionRegisters::default(),
            swing: MotionState::default(),
            tilt: RotationalState::default(),
            shake: ShakeState::default(),
            accel: AccelData::default(),
        };
        nunchuk.reset();
        nunchuk
    }
}

impl Nunchuk {
    // https://www.wiibrew.org/wiki/Wiimote/Extension_Controllers/Nunchuck#Calibration_data
    #[allow(clippy::cast_possible_truncation)]
    fn calibration() -> [u8; 32] {
        let mut record = [0u8; 16];
        record[..3].fill(ACCEL_ZERO_G as u8);
        record[4..7].fill(ACCEL_ONE_G as u8);
        record[8..11].copy_from_slice(&[STICK_CENTER + STICK_RADIUS, STICK_CENTER - STICK_RADIUS, STICK_CENTER]);
        record[11..14].copy_from_slice(&[STICK_CENTER + STICK_RADIUS, STICK_CENTER - STICK_RADIUS, STICK_CENTER]);
        update_calibration_checksum(&mut record, 2);

        let mut calibration = [0u8; 32];
        calibration[..16].copy_from_slice(&record);
        calibration[16..].copy_from_slice(&record);
        calibration
    }

    /// Acceleration of the nunchuk in m/s², before encoding.
    #[must_use]
    pub fn acceleration(&self) -> Vec3 {
        let rotation = Matrix33::from_angles(-self.tilt.angle) * Matrix33::from_angles(-self.swing.angle);
        rotation * (self.swing.acceleration + Vec3::new(0.0, 0.0, GRAVITY_ACCELERATION))
            + self.shake.acceleration
    }

    /// Last encoded accelerometer sample.
    #[must_use]
    pub const fn accel_data(&self) -> AccelData {
        self.accel
    }

    /// Stick position, each axis in `-1.0..=1.0`.
    #[must_use]
    pub fn stick(input: &dyn ControlSource) -> (f32, f32) {
        let stick = directional_input(input, |d| control(NunchukControl::Stick(d)));
        (stick.x, stick.z)
    }
}

impl Extension for Nunchuk {
    fn number(&self) -> ExtensionNumber {
        ExtensionNumber::Nunchuk
    }

    fn reset(&mut self) {
        self.registers.reset(IDENTIFIER, &Self::calibration());
        self.swing = MotionState::default();
        self.tilt = RotationalState::default();
        self.shake = ShakeState::default();
        self.accel = AccelData::default();
    }

    #[allow(clippy::cast_precision_loss)]
    fn update(&mut self, input: &dyn ControlSource) {
        let dt = 1.0 / UPDATE_FREQ as f32;
        emulate_swing(
            &mut self.swing,
            directional_input(input, |d| control(NunchukControl::Swing(d))),
            dt,
        );
        emulate_tilt(
            &mut self.tilt,
            directional_input(input, |d| control(NunchukControl::Tilt(d))),
            dt,
        );
        emulate_shake(
            &mut self.shake,
            shake_input(input, |axis| control(NunchukControl::Shake(axis))),
            dt,
        );
    }

    // https://www.wiibrew.org/wiki/Wiimote/Extension_Controllers/Nunchuck#Data_Format
    #[allow(clippy::cast_possible_truncation)]
    fn prepare_input(&mut self, input: &dyn ControlSource) {
        let (x, y) = Self::stick(input);
        self.accel = convert_accel_data(self.acceleration(), ACCEL_ZERO_G << 2, ACCEL_ONE_G << 2, 10);

        let mut buttons = 0u8;
        if input.is_pressed(control(NunchukControl::Z)) {
            buttons |= BUTTON_Z;
        }
        if input.is_pressed(control(NunchukControl::C)) {
            buttons |= BUTTON_C;
        }

        let accel = self.accel;
        let data = [
            to_unsigned_axis(x, STICK_CENTER, STICK_RADIUS, 8),
            to_unsigned_axis(y, STICK_CENTER, STICK_RADIUS, 8),
            (accel.x >> 2) as u8,
            (accel.y >> 2) as u8,
            (accel.z >> 2) as u8,
            // Buttons are active low.
            (!buttons & 0b11)
                | (((accel.x & 0b11) as u8) << 2)
                | (((accel.y & 0b11) as u8) << 4)
                | (((accel.z & 0b11) as u8) << 6),
        ];
        self.registers.set_controller_data(&data);
    }

    fn is_button_pressed(&self, input: &dyn ControlSource) -> bool {
        input.is_pressed(control(NunchukControl::C)) || input.is_pressed(control(NunchukControl::Z))
    }

    fn registers(&self) -> Option<&ExtensionRegisters> {
        Some(&self.registers)
    }

    fn registers_mut(&mut self) -> Option<&mut ExtensionRegisters> {
        Some(&mut self.registers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::verify_calibration_checksum;
    use crate::extensions::{CALIBRATION_OFFSET, IDENTIFIER_OFFSET};
    use crate::host::Direction;
    use crate::testing::TestControls;

    #[test]
    fn test_identifier_and_calibration() {
        let nunchuk = Nunchuk::default();
        let registers = nunchuk.registers().unwrap();
        assert_eq!(registers.identifier(), IDENTIFIER);
        let mut calibration = [0u8; 16];
        registers.read(CALIBRATION_OFFSET, &mut calibration);
        assert!(verify_calibration_checksum(&calibration, 2));
        assert_eq!(registers.get(IDENTIFIER_OFFSET + 5), 0x00);
    }

    #[test]
    fn test_resting_data() {
        let mut nunchuk = Nunchuk::default();
        let input = TestControls::default();
        nunchuk.update(&input);
        nunchuk.prepare_input(&input);

        let data = nunchuk.registers().unwrap().controller_data(6);
        assert_eq!(&data[..2], &[0x80, 0x80]);
        assert_eq!(data[2], 0x80);
        assert_eq!(data[3], 0x80);
        assert_eq!(data[4], 0xB3);
        assert_eq!(data[5] & 0b11, 0b11);
        assert!(!nunchuk.is_button_pressed(&input));
    }

    #[test]
    fn test_buttons_and_stick() {
        let mut nunchuk = Nunchuk::default();
        let input = TestControls::pressed(&[
            control(NunchukControl::C),
            control(NunchukControl::Stick(Direction::Up)),
            control(NunchukControl::Stick(Direction::Left)),
        ]);
        nunchuk.prepare_input(&input);

        let data = nunchuk.registers().unwrap().controller_data(6);
        assert_eq!(data[0], 0x01);
        assert_eq!(data[1], 0xFF);
        assert_eq!(data[5] & 0b11, 0b01);
        assert!(nunchuk.is_button_pressed(&input));
    }

    #[test]
    fn test_tilt_changes_acceleration() {
        let mut nunchuk = Nunchuk::default();
        let input = TestControls::pressed(&[control(NunchukControl::Tilt(Direction::Right))]);
        for _ in 0..UPDATE_FREQ {
            nunchuk.update(&input);
        }
        let accel = nunchuk.acceleration();
        assert!(accel.x.abs() > 5.0);
        assert!((accel.length() - GRAVITY_ACCELERATION).abs() < 0.1);
    }
}
