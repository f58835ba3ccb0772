use std::ops::Range;

use crate::calibration::{
    update_calibration_checksum, AccelerometerCalibration, ACCEL_ONE_G, ACCEL_ZERO_G,
};
use crate::camera::{IR_HIGH_X, IR_HIGH_Y, IR_LOW_X, IR_LOW_Y};

/// Size of the user accessible part of the EEPROM.
pub const EEPROM_FREE_SIZE: usize = 0x1700;

// https://www.wiibrew.org/wiki/Wiimote#EEPROM_Memory
const IR_CALIBRATION_1: Range<usize> = 0x0000..0x000B;
const IR_CALIBRATION_2: Range<usize> = 0x000B..0x0016;
const ACCEL_CALIBRATION_1: Range<usize> = 0x0016..0x0020;
const ACCEL_CALIBRATION_2: Range<usize> = 0x0020..0x002A;
const MII_DATA_1: Range<usize> = 0x0FCA..0x12BA;
const MII_DATA_2: Range<usize> = 0x12BA..0x15AA;
const UNKNOWN_16D0: Range<usize> = 0x16D0..0x16E8;

/// Records protected by a single trailing checksum byte.
const CALIBRATION_RECORDS: [Range<usize>; 4] = [
    IR_CALIBRATION_1,
    IR_CALIBRATION_2,
    ACCEL_CALIBRATION_1,
    ACCEL_CALIBRATION_2,
];

const EEPROM_DATA_16D0: [u8; 24] = [
    0x00, 0x00, 0x00, 0xFF, 0x11, 0xEE, 0x00, 0x00, 0x33, 0xCC, 0x44, 0xBB, 0x00, 0x00, 0x66, 0x99,
    0x77, 0x88, 0x00, 0x00, 0x2B, 0x01, 0xE8, 0x13,
];

/// The emulated EEPROM image, persisted per device between resets.
#[derive(Clone, PartialEq, Eq)]
pub struct Eeprom {
    data: Vec<u8>,
}

impl std::fmt::Debug for Eeprom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Eeprom")
            .field("size", &self.data.len())
            .finish_non_exhaustive()
    }
}

impl Default for Eeprom {
    /// Factory image with default IR and accelerometer calibration.
    #[allow(clippy::cast_possible_truncation)]
    fn default() -> Self {
        let mut data = vec![0u8; EEPROM_FREE_SIZE];

        #[rustfmt::skip]
        let mut ir_calibration: [u8; 11] = [
            // Point 1
            (IR_LOW_X & 0xFF) as u8,
            (IR_LOW_Y & 0xFF) as u8,
            // Mix
            (((IR_LOW_Y & 0x300) >> 2) | ((IR_LOW_X & 0x300) >> 4) | ((IR_LOW_Y & 0x300) >> 6)
                | ((IR_HIGH_X & 0x300) >> 8)) as u8,
            // Point 2
            (IR_HIGH_X & 0xFF) as u8,
            (IR_LOW_Y & 0xFF) as u8,
            // Point 3
            (IR_HIGH_X & 0xFF) as u8,
            (IR_HIGH_Y & 0xFF) as u8,
            // Mix
            (((IR_HIGH_Y & 0x300) >> 2) | ((IR_HIGH_X & 0x300) >> 4) | ((IR_HIGH_Y & 0x300) >> 6)
                | ((IR_LOW_X & 0x300) >> 8)) as u8,
            // Point 4
            (IR_LOW_X & 0xFF) as u8,
            (IR_HIGH_Y & 0xFF) as u8,
            // Checksum
            0x00,
        ];
        update_calibration_checksum(&mut ir_calibration, 1);
        data[IR_CALIBRATION_1].copy_from_slice(&ir_calibration);
        data[IR_CALIBRATION_2].copy_from_slice(&ir_calibration);

        let mut accel_calibration = [0u8; 10];
        AccelerometerCalibration::new(
            u16::from(ACCEL_ZERO_G) << 2,
            u16::from(ACCEL_ONE_G) << 2,
        )
        .write_bytes(&mut accel_calibration);
        update_calibration_checksum(&mut accel_calibration, 1);
        data[ACCEL_CALIBRATION_1].copy_from_slice(&accel_calibration);
        data[ACCEL_CALIBRATION_2].copy_from_slice(&accel_calibration);

        data[UNKNOWN_16D0].copy_from_slice(&EEPROM_DATA_16D0);

        Self { data }
    }
}

impl Eeprom {
    /// Builds an image from persisted bytes. Short input is zero padded, extra bytes are ignored.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut data = vec![0u8; EEPROM_FREE_SIZE];
        let size = bytes.len().min(EEPROM_FREE_SIZE);
        data[..size].copy_from_slice(&bytes[..size]);
        Self { data }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Copies as many bytes as available starting at `address`, returns the count.
    pub fn read(&self, address: usize, out: &mut [u8]) -> usize {
        if address >= EEPROM_FREE_SIZE {
            return 0;
        }
        let size = out.len().min(EEPROM_FREE_SIZE - address);
        out[..size].copy_from_slice(&self.data[address..address + size]);
        size
    }

    /// Writes `data` at `address`, returns the count of bytes written.
    ///
    /// Calibration records touched by the write get their checksum recomputed.
    pub fn write(&mut self, address: usize, data: &[u8]) -> usize {
        if address >= EEPROM_FREE_SIZE {
            return 0;
        }
        let size = data.len().min(EEPROM_FREE_SIZE - address);
        let written = address..address + size;
        self.data[written.clone()].copy_from_slice(&data[..size]);

        for record in CALIBRATION_RECORDS {
            let checked = record.start..record.end - 1;
            if written.start < checked.end && checked.start < written.end {
                update_calibration_checksum(&mut self.data[record], 1);
            }
        }
        size
    }

    /// Stores the Mii block in both redundant copies.
    pub fn import_mii(&mut self, mii: &[u8]) {
        let size = mii.len().min(MII_DATA_1.len());
        self.data[MII_DATA_1.start..MII_DATA_1.start + size].copy_from_slice(&mii[..size]);
        self.data[MII_DATA_2.start..MII_DATA_2.start + size].copy_from_slice(&mii[..size]);
    }

    #[must_use]
    pub fn mii_data(&self) -> &[u8] {
        &self.data[MII_DATA_1]
    }

    #[must_use]
    pub fn ir_calibration(&self) -> &[u8] {
        &self.data[IR_CALIBRATION_1]
    }

    #[must_use]
    pub fn accel_calibration_bytes(&self) -> &[u8] {
        &self.data[ACCEL_CALIBRATION_1]
    }

    /// Decodes the first accelerometer calibration record.
    #[must_use]
    pub fn accel_calibration(&self) -> AccelerometerCalibration {
        AccelerometerCalibration::from_bytes(self.accel_calibration_bytes()).unwrap_or_default()
    }
}
