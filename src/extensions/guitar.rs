use bitflags::bitflags;

use super::{Extension, ExtensionNumber, ExtensionRegisters};
use crate::dynamics::directional_input;
use crate::host::{Control, ControlSource, Direction, Fret, GuitarControl};
use crate::math::{remap, to_unsigned_axis};

const IDENTIFIER: [u8; 6] = [0x00, 0x00, 0xA4, 0x20, 0x01, 0x03];

const STICK_CENTER: u8 = 0x20;
const STICK_RADIUS: u8 = 0x1F;
const WHAMMY_REST: u8 = 0x10;
const WHAMMY_RANGE: f32 = 15.0;
const TOUCH_BAR_IDLE: u8 = 0x0F;
const TOUCH_BAR_GREEN: f32 = 0x04 as f32;
const TOUCH_BAR_ORANGE: f32 = 0x1F as f32;

bitflags! {
    /// Button bits of bytes 4 and 5, sent inverted.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct GuitarButtons: u16 {
        const STRUM_DOWN = 0x0040;
        const MINUS = 0x0010;
        const PLUS = 0x0004;

        const ORANGE = 0x8000;
        const RED = 0x4000;
        const BLUE = 0x2000;
        const GREEN = 0x1000;
        const YELLOW = 0x0800;
        const STRUM_UP = 0x0100;
    }
}

const BUTTON_MAP: [(GuitarControl, GuitarButtons); 9] = [
    (GuitarControl::Fret(Fret::Green), GuitarButtons::GREEN),
    (GuitarControl::Fret(Fret::Red), GuitarButtons::RED),
    (GuitarControl::Fret(Fret::Yellow), GuitarButtons::YELLOW),
    (GuitarControl::Fret(Fret::Blue), GuitarButtons::BLUE),
    (GuitarControl::Fret(Fret::Orange), GuitarButtons::ORANGE),
    (GuitarControl::StrumUp, GuitarButtons::STRUM_UP),
    (GuitarControl::StrumDown, GuitarButtons::STRUM_DOWN),
    (GuitarControl::Minus, GuitarButtons::MINUS),
    (GuitarControl::Plus, GuitarButtons::PLUS),
];

fn control(control: GuitarControl) -> Control {
    Control::Guitar(control)
}

/// Guitar Hero guitar.
#[derive(Debug, Clone)]
pub struct Guitar {
    registers: ExtensionRegisters,
}

impl Default for Guitar {
    fn default() -> Self {
        Self {
            registers: ExtensionRegisters::new(IDENTIFIER, &[]),
        }
    }
}

impl Guitar {
    #[must_use]
    pub fn buttons(input: &dyn ControlSource) -> GuitarButtons {
        BUTTON_MAP
            .iter()
            .filter(|(button, _)| input.is_pressed(control(*button)))
            .fold(GuitarButtons::empty(), |acc, (_, bit)| acc | *bit)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn touch_bar(input: &dyn ControlSource) -> u8 {
        let left = control(GuitarControl::TouchBar(Direction::Left));
        let right = control(GuitarControl::TouchBar(Direction::Right));
        if input.state(left) <= 0.0 && input.state(right) <= 0.0 {
            return TOUCH_BAR_IDLE;
        }
        remap(input.axis(left, right), -1.0, 1.0, TOUCH_BAR_GREEN, TOUCH_BAR_ORANGE).round() as u8
    }
}

impl Extension for Guitar {
    fn number(&self) -> ExtensionNumber {
        ExtensionNumber::Guitar
    }

    fn reset(&mut self) {
        self.registers.reset(IDENTIFIER, &[]);
    }

    // https://www.wiibrew.org/wiki/Wiimote/Extension_Controllers/Guitar_Hero_(Wii)_Guitars#Data_Format
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn prepare_input(&mut self, input: &dyn ControlSource) {
        let stick = directional_input(input, |d| control(GuitarControl::Stick(d)));
        let whammy = input.state(control(GuitarControl::Whammy)).clamp(0.0, 1.0);
        let buttons = (!Self::buttons(input).bits()).to_le_bytes();

        let data = [
            to_unsigned_axis(stick.x, STICK_CENTER, STICK_RADIUS, 6),
            to_unsigned_axis(stick.z, STICK_CENTER, STICK_RADIUS, 6),
            Self::touch_bar(input),
            WHAMMY_REST + (whammy * WHAMMY_RANGE).round() as u8,
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
    use crate::testing::TestControls;

    #[test]
    fn test_idle_guitar() {
        let mut guitar = Guitar::default();
        let input = TestControls::default();
        guitar.prepare_input(&input);

        let data = guitar.registers().unwrap().controller_data(6);
        assert_eq!(data, &[0x20, 0x20, TOUCH_BAR_IDLE, WHAMMY_REST, 0xFF, 0xFF]);
        assert!(!guitar.is_button_pressed(&input));
    }

    #[test]
    fn test_frets_strum_and_whammy() {
        let mut guitar = Guitar::default();
        let input = TestControls::pressed(&[
            control(GuitarControl::Fret(Fret::Green)),
            control(GuitarControl::Fret(Fret::Orange)),
            control(GuitarControl::StrumDown),
            control(GuitarControl::Whammy),
            control(GuitarControl::TouchBar(Direction::Right)),
        ]);
        guitar.prepare_input(&input);

        let data = guitar.registers().unwrap().controller_data(6);
        let buttons = GuitarButtons::from_bits_truncate(!u16::from_le_bytes([data[4], data[5]]));
        assert_eq!(
            buttons,
            GuitarButtons::GREEN | GuitarButtons::ORANGE | GuitarButtons::STRUM_DOWN
        );
        assert_eq!(data[2], 0x1F);
        assert_eq!(data[3], 0x1F);
        assert!(guitar.is_button_pressed(&input));
    }
}
