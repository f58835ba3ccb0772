use bitflags::bitflags;

use super::{Extension, ExtensionNumber, ExtensionRegisters};
use crate::calibration::update_calibration_checksum;
use crate::dynamics::directional_input;
use crate::host::{ClassicButton, ClassicControl, Control, ControlSource};
use crate::math::to_unsigned_axis;

const IDENTIFIER: [u8; 6] = [0x00, 0x00, 0xA4, 0x20, 0x01, 0x01];

const LEFT_STICK_CENTER: u8 = 0x20;
const LEFT_STICK_RADIUS: u8 = 0x1F;
const RIGHT_STICK_CENTER: u8 = 0x10;
const RIGHT_STICK_RADIUS: u8 = 0x0F;
const TRIGGER_MAX: u8 = 0x1F;

bitflags! {
    /// Button bits of bytes 4 and 5, sent inverted.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct ClassicButtons: u16 {
        const RIGHT = 0x0080;
        const DOWN = 0x0040;
        const LT = 0x0020;
        const MINUS = 0x0010;
        const HOME = 0x0008;
        const PLUS = 0x0004;
        const RT = 0x0002;

        const ZL = 0x8000;
        const B = 0x4000;
        const Y = 0x2000;
        const A = 0x1000;
        const X = 0x0800;
        const ZR = 0x0400;
        const LEFT = 0x0200;
        const UP = 0x0100;
    }
}

const BUTTON_MAP: [(ClassicButton, ClassicButtons); 13] = [
    (ClassicButton::A, ClassicButtons::A),
    (ClassicButton::B, ClassicButtons::B),
    (ClassicButton::X, ClassicButtons::X),
    (ClassicButton::Y, ClassicButtons::Y),
    (ClassicButton::ZL, ClassicButtons::ZL),
    (ClassicButton::ZR, ClassicButtons::ZR),
    (ClassicButton::Minus, ClassicButtons::MINUS),
    (ClassicButton::Home, ClassicButtons::HOME),
    (ClassicButton::Plus, ClassicButtons::PLUS),
    (ClassicButton::Up, ClassicButtons::UP),
    (ClassicButton::Down, ClassicButtons::DOWN),
    (ClassicButton::Left, ClassicButtons::LEFT),
    (ClassicButton::Right, ClassicButtons::RIGHT),
];

fn control(control: ClassicControl) -> Control {
    Control::Classic(control)
}

/// Classic Controller in data format 1.
#[derive(Debug, Clone)]
pub struct Classic {
    registers: ExtensionRegisters,
}

impl Default for Classic {
    fn default() -> Self {
        Self {
            registers: ExtensionRegisters::new(IDENTIFIER, &Self::calibration()),
        }
    }
}

impl Classic {
    // https://www.wiibrew.org/wiki/Wiimote/Extension_Controllers/Classic_Controller#Calibration_data
    fn calibration() -> [u8; 32] {
        let left = |value: u8| value << 2;
        let right = |value: u8| value << 3;
        let mut record = [
            left(LEFT_STICK_CENTER + LEFT_STICK_RADIUS),
            left(LEFT_STICK_CENTER - LEFT_STICK_RADIUS),
            left(LEFT_STICK_CENTER),
            left(LEFT_STICK_CENTER + LEFT_STICK_RADIUS),
            left(LEFT_STICK_CENTER - LEFT_STICK_RADIUS),
            left(LEFT_STICK_CENTER),
            right(RIGHT_STICK_CENTER + RIGHT_STICK_RADIUS),
            right(RIGHT_STICK_CENTER - RIGHT_STICK_RADIUS),
            right(RIGHT_STICK_CENTER),
            right(RIGHT_STICK_CENTER + RIGHT_STICK_RADIUS),
            right(RIGHT_STICK_CENTER - RIGHT_STICK_RADIUS),
            right(RIGHT_STICK_CENTER),
            0x00,
            0x00,
            0x00,
            0x00,
        ];
        update_calibration_checksum(&mut record, 2);

        let mut calibration = [0u8; 32];
        calibration[..16].copy_from_slice(&record);
        calibration[16..].copy_from_slice(&record);
        calibration
    }

    /// Pressed buttons including the digital trigger clicks.
    #[must_use]
    pub fn buttons(input: &dyn ControlSource) -> ClassicButtons {
        let mut buttons = BUTTON_MAP
            .iter()
            .filter(|(button, _)| input.is_pressed(control(ClassicControl::Button(*button))))
            .fold(ClassicButtons::empty(), |acc, (_, bit)| acc | *bit);
        if input.state(control(ClassicControl::LeftTrigger)) >= 1.0 {
            buttons |= ClassicButtons::LT;
        }
        if input.state(control(ClassicControl::RightTrigger)) >= 1.0 {
            buttons |= ClassicButtons::RT;
        }
        buttons
    }
}

impl Extension for Classic {
    fn number(&self) -> ExtensionNumber {
        ExtensionNumber::Classic
    }

    fn reset(&mut self) {
        self.registers.reset(IDENTIFIER, &Self::calibration());
    }

    // https://www.wiibrew.org/wiki/Wiimote/Extension_Controllers/Classic_Controller#Data_Format
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn prepare_input(&mut self, input: &dyn ControlSource) {
        let left = directional_input(input, |d| control(ClassicControl::LeftStick(d)));
        let right = directional_input(input, |d| control(ClassicControl::RightStick(d)));

        let lx = to_unsigned_axis(left.x, LEFT_STICK_CENTER, LEFT_STICK_RADIUS, 6);
        let ly = to_unsigned_axis(left.z, LEFT_STICK_CENTER, LEFT_STICK_RADIUS, 6);
        let rx = to_unsigned_axis(right.x, RIGHT_STICK_CENTER, RIGHT_STICK_RADIUS, 5);
        let ry = to_unsigned_axis(right.z, RIGHT_STICK_CENTER, RIGHT_STICK_RADIUS, 5);
        let trigger = |trigger: ClassicControl| {
            (input.state(control(trigger)).clamp(0.0, 1.0) * f32::from(TRIGGER_MAX)).round() as u8
        };
        let lt = trigger(ClassicControl::LeftTrigger);
        let rt = trigger(ClassicControl::RightTrigger);

        let buttons = (!Self::buttons(input).bits()).to_le_bytes();
        let data = [
            ((rx & 0b1_1000) << 3) | lx,
            ((rx & 0b0_0110) << 5) | ly,
            ((rx & 0b0_0001) << 7) | ((lt & 0b1_1000) << 2) | ry,
            ((lt & 0b0_0111) << 5) | rt,
            buttons[0],
            buttons[1],
        ];
        self.registers.set_controller_data(&data);
    }

    fn is_button_pressed(&self, input: &dyn ControlSource) -> bool {
        !Self::buttons(input).is_empty()
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
    use crate::host::Direction;
    use crate::testing::TestControls;

    fn decode(data: &[u8]) -> (u8, u8, u8, u8, u8, u8, ClassicButtons) {
        let lx = data[0] & 0x3F;
        let ly = data[1] & 0x3F;
        let rx = ((data[0] >> 6) << 3) | ((data[1] >> 6) << 1) | (data[2] >> 7);
        let ry = data[2] & 0x1F;
        let lt = (((data[2] >> 5) & 0b11) << 3) | (data[3] >> 5);
        let rt = data[3] & 0x1F;
        let buttons = ClassicButtons::from_bits_truncate(!u16::from_le_bytes([data[4], data[5]]));
        (lx, ly, rx, ry, lt, rt, buttons)
    }

    #[test]
    fn test_resting_state() {
        let mut classic = Classic::default();
        let input = TestControls::default();
        classic.prepare_input(&input);

        let data = classic.registers().unwrap().controller_data(6);
        let (lx, ly, rx, ry, lt, rt, buttons) = decode(data);
        assert_eq!((lx, ly, rx, ry, lt, rt), (0x20, 0x20, 0x10, 0x10, 0, 0));
        assert!(buttons.is_empty());
        assert_eq!(data[4] & 0x01, 0x01);
        assert!(!classic.is_button_pressed(&input));
    }

    #[test]
    fn test_sticks_triggers_and_buttons() {
        let mut classic = Classic::default();
        let input = TestControls::pressed(&[
            control(ClassicControl::LeftStick(Direction::Right)),
            control(ClassicControl::RightStick(Direction::Down)),
            control(ClassicControl::RightStick(Direction::Right)),
            control(ClassicControl::Button(ClassicButton::A)),
            control(ClassicControl::Button(ClassicButton::Up)),
            control(ClassicControl::LeftTrigger),
        ]);
        input.set(control(ClassicControl::RightTrigger), 0.5);
        classic.prepare_input(&input);

        let (lx, ly, rx, ry, lt, rt, buttons) = decode(classic.registers().unwrap().controller_data(6));
        assert_eq!((lx, ly), (0x3F, 0x20));
        assert_eq!((rx, ry), (0x1F, 0x01));
        assert_eq!(lt, 0x1F);
        assert_eq!(rt, 0x10);
        assert_eq!(buttons, ClassicButtons::A | ClassicButtons::UP | ClassicButtons::LT);
        assert!(classic.is_button_pressed(&input));
    }
}
