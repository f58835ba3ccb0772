//! The built-in speaker, decoding the streamed audio data.

use crate::bus::{I2cSlave, RegisterBlock};

pub const I2C_ADDR: u8 = 0x51;

/// Writes to this register carry audio data instead of configuration.
pub const SPEAKER_DATA_OFFSET: u8 = 0x00;

const REG_FORMAT: u8 = 0x02;
const REG_SAMPLE_RATE: u8 = 0x03;
const REG_VOLUME: u8 = 0x05;

pub const FORMAT_ADPCM: u8 = 0x00;
pub const FORMAT_PCM: u8 = 0x40;

// Yamaha ADPCM
const INDEX_SCALE: [i32; 16] = [
    230, 230, 230, 230, 307, 409, 512, 614, 230, 230, 230, 230, 307, 409, 512, 614,
];
const DIFF_LOOKUP: [i32; 16] = [
    1, 3, 5, 7, 9, 11, 13, 15, -1, -3, -5, -7, -9, -11, -13, -15,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdpcmState {
    predictor: i32,
    step: i32,
}

impl Default for AdpcmState {
    fn default() -> Self {
        Self {
            predictor: 0,
            step: 127,
        }
    }
}

impl AdpcmState {
    #[allow(clippy::cast_possible_truncation)]
    pub fn expand_nibble(&mut self, nibble: u8) -> i16 {
        let nibble = usize::from(nibble & 0x0F);
        self.predictor += (self.step * DIFF_LOOKUP[nibble]) / 8;
        self.predictor = self.predictor.clamp(i32::from(i16::MIN), i32::from(i16::MAX));
        self.step = (self.step * INDEX_SCALE[nibble]) >> 8;
        self.step = self.step.clamp(127, 24576);
        self.predictor as i16
    }
}

#[derive(Debug, Default)]
pub struct SpeakerLogic {
    registers: RegisterBlock,
    adpcm: AdpcmState,
    samples: Vec<i16>,
}

impl SpeakerLogic {
    pub fn reset(&mut self) {
        self.registers.clear();
        self.adpcm = AdpcmState::default();
        self.samples.clear();
    }

    #[must_use]
    pub fn format(&self) -> u8 {
        self.registers.get(REG_FORMAT)
    }

    /// Sample rate in Hz, zero while unconfigured.
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        let value = u16::from_le_bytes([
            self.registers.get(REG_SAMPLE_RATE),
            self.registers.get(REG_SAMPLE_RATE + 1),
        ]);
        if value == 0 {
            0
        } else {
            12_000_000 / u32::from(value)
        }
    }

    /// Volume in `0.0..=1.0`.
    #[must_use]
    pub fn volume(&self) -> f32 {
        let max = if self.format() == FORMAT_PCM { 255.0 } else { 127.0 };
        (f32::from(self.registers.get(REG_VOLUME)) / max).min(1.0)
    }

    fn speaker_data(&mut self, data: &[u8]) {
        match self.format() {
            FORMAT_PCM => {
                #[allow(clippy::cast_possible_wrap)]
                self.samples
                    .extend(data.iter().map(|&b| i16::from(b as i8) << 8));
            }
            FORMAT_ADPCM => {
                for &byte in data {
                    let high = self.adpcm.expand_nibble(byte >> 4);
                    let low = self.adpcm.expand_nibble(byte & 0x0F);
                    self.samples.extend([high, low]);
                }
            }
            format => tracing::debug!(format, "unsupported speaker format"),
        }
    }

    /// Returns the samples decoded since the last call.
    pub fn take_samples(&mut self) -> Vec<i16> {
        std::mem::take(&mut self.samples)
    }
}

impl I2cSlave for SpeakerLogic {
    fn bus_read(&mut self, slave_addr: u8, addr: u8, out: &mut [u8]) -> usize {
        if slave_addr != I2C_ADDR {
            return 0;
        }
        self.registers.read(addr, out)
    }

    fn bus_write(&mut self, slave_addr: u8, addr: u8, data: &[u8]) -> usize {
        if slave_addr != I2C_ADDR {
            return 0;
        }
        if addr == SPEAKER_DATA_OFFSET {
            self.speaker_data(data);
            data.len()
        } else {
            self.registers.write(addr, data)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adpcm_first_nibbles() {
        let mut state = AdpcmState::default();
        // 127 * 15 / 8
        assert_eq!(state.expand_nibble(0x7), 238);
        assert_eq!(state.step, (127 * 614) >> 8);
        let mut state = AdpcmState::default();
        assert_eq!(state.expand_nibble(0x8), -15);
        assert_eq!(state.step, 127);
    }

    #[test]
    fn test_adpcm_stays_in_range() {
        let mut state = AdpcmState::default();
        for _ in 0..1000 {
            state.expand_nibble(0x7);
        }
        assert_eq!(state.predictor, i32::from(i16::MAX));
        assert_eq!(state.step, 24576);
    }

    #[test]
    fn test_configuration_and_data() {
        let mut speaker = SpeakerLogic::default();
        // Format PCM, 3000 Hz, full volume.
        let config = [0x00, FORMAT_PCM, 0xA0, 0x0F, 0xFF, 0x00, 0x00];
        assert_eq!(speaker.bus_write(I2C_ADDR, 0x01, &config), 7);
        assert_eq!(speaker.sample_rate(), 3000);
        assert!((speaker.volume() - 1.0).abs() < f32::EPSILON);

        assert_eq!(speaker.bus_write(I2C_ADDR, SPEAKER_DATA_OFFSET, &[0x40, 0xC0]), 2);
        assert_eq!(speaker.take_samples(), vec![0x4000, -0x4000]);
        assert!(speaker.take_samples().is_empty());
    }

    #[test]
    fn test_adpcm_produces_two_samples_per_byte() {
        let mut speaker = SpeakerLogic::default();
        speaker.bus_write(I2C_ADDR, SPEAKER_DATA_OFFSET, &[0x12; 20]);
        assert_eq!(speaker.take_samples().len(), 40);
    }

    #[test]
    fn test_other_address_ignored() {
        let mut speaker = SpeakerLogic::default();
        assert_eq!(speaker.bus_write(0x58, SPEAKER_DATA_OFFSET, &[1, 2]), 0);
        assert!(speaker.take_samples().is_empty());
    }
}
