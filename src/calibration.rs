use crate::math::{Vec3, GRAVITY_ACCELERATION};

pub const CALIBRATION_MAGIC_NUMBER: u8 = 0x55;

/// 8-bit zero and one g values of the remote accelerometer.
pub const ACCEL_ZERO_G: u8 = 0x80;
pub const ACCEL_ONE_G: u8 = 0x9A;

/// Writes the trailing checksum byte(s) of a calibration record.
///
/// The first checksum is `0x55` plus the sum of all data bytes, each following
/// checksum byte adds another `0x55`.
pub fn update_calibration_checksum(data: &mut [u8], checksum_bytes: usize) {
    let data_len = data.len() - checksum_bytes;
    let mut checksum = calibration_checksum(&data[..data_len]);
    for byte in &mut data[data_len..] {
        *byte = checksum;
        checksum = checksum.wrapping_add(CALIBRATION_MAGIC_NUMBER);
    }
}

#[must_use]
pub fn verify_calibration_checksum(data: &[u8], checksum_bytes: usize) -> bool {
    let data_len = data.len() - checksum_bytes;
    let mut checksum = calibration_checksum(&data[..data_len]);
    data[data_len..].iter().all(|byte| {
        let matches = *byte == checksum;
        checksum = checksum.wrapping_add(CALIBRATION_MAGIC_NUMBER);
        matches
    })
}

fn calibration_checksum(data: &[u8]) -> u8 {
    data.iter()
        .fold(CALIBRATION_MAGIC_NUMBER, |sum, byte| sum.wrapping_add(*byte))
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)] // Numbers will not be that large
pub fn normalize<TValue, TResult>(
    value: TValue,
    value_bits: usize,
    zero: TValue,
    max: TValue,
    calibration_bits: usize,
) -> TResult
where
    TValue: std::ops::Shl<usize, Output = TValue> + Into<TResult> + Copy,
    TResult: std::ops::Sub<Output = TResult> + std::ops::Div<Output = TResult> + Copy,
{
    let missing_calibration_bits =
        isize::max(0, value_bits as isize - calibration_bits as isize) as usize;
    let missing_value_bits =
        isize::max(0, calibration_bits as isize - value_bits as isize) as usize;

    let value = value << missing_value_bits;
    let zero = zero << missing_calibration_bits;
    let max = max << missing_calibration_bits;

    (Into::<TResult>::into(value) - Into::<TResult>::into(zero))
        / (Into::<TResult>::into(max) - Into::<TResult>::into(zero))
}

/// 10-bit accelerometer sample as sent in data reports.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AccelData {
    pub x: u16,
    pub y: u16,
    pub z: u16,
}

/// Converts an acceleration in m/s² to a raw sample.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn convert_accel_data(accel: Vec3, zero_g: u16, one_g: u16, bits: u32) -> AccelData {
    let max = f32::from(((1u32 << bits) - 1) as u16);
    let scale = f32::from(one_g - zero_g) / GRAVITY_ACCELERATION;
    let raw = accel.map(|v| v.mul_add(scale, f32::from(zero_g)).round().clamp(0.0, max));
    AccelData {
        x: raw.x as u16,
        y: raw.y as u16,
        z: raw.z as u16,
    }
}

/// The calibration record for an accelerometer as stored in EEPROM or extension registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccelerometerCalibration {
    x_zero_offset: u16,
    y_zero_offset: u16,
    z_zero_offset: u16,
    x_gravity: u16,
    y_gravity: u16,
    z_gravity: u16,
}

impl Default for AccelerometerCalibration {
    fn default() -> Self {
        let zero = u16::from(ACCEL_ZERO_G) << 2;
        let one = u16::from(ACCEL_ONE_G) << 2;
        Self::new(zero, one)
    }
}

impl AccelerometerCalibration {
    /// Uniform 10-bit calibration for all three axes.
    #[must_use]
    pub const fn new(zero: u16, one_g: u16) -> Self {
        Self {
            x_zero_offset: zero,
            y_zero_offset: zero,
            z_zero_offset: zero,
            x_gravity: one_g,
            y_gravity: one_g,
            z_gravity: one_g,
        }
    }

    // https://www.wiibrew.org/wiki/Wiimote#EEPROM_Memory
    // High 8 bits of X,Y,Z in the first three bytes, low 2 bits packed in the fourth byte as --XXYYZZ.
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 8 {
            return None;
        }
        Some(Self {
            x_zero_offset: ((data[0] as u16) << 2) | ((data[3] as u16) >> 4 & 0b11),
            y_zero_offset: ((data[1] as u16) << 2) | ((data[3] as u16) >> 2 & 0b11),
            z_zero_offset: ((data[2] as u16) << 2) | ((data[3] as u16) & 0b11),
            x_gravity: ((data[4] as u16) << 2) | ((data[7] as u16) >> 4 & 0b11),
            y_gravity: ((data[5] as u16) << 2) | ((data[7] as u16) >> 2 & 0b11),
            z_gravity: ((data[6] as u16) << 2) | ((data[7] as u16) & 0b11),
        })
    }

    /// Writes the record into the first 8 bytes of `out`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn write_bytes(&self, out: &mut [u8]) {
        let pack = |x: u16, y: u16, z: u16| {
            [
                (x >> 2) as u8,
                (y >> 2) as u8,
                (z >> 2) as u8,
                (((x & 0b11) << 4) | ((y & 0b11) << 2) | (z & 0b11)) as u8,
            ]
        };
        out[..4].copy_from_slice(&pack(self.x_zero_offset, self.y_zero_offset, self.z_zero_offset));
        out[4..8].copy_from_slice(&pack(self.x_gravity, self.y_gravity, self.z_gravity));
    }

    /// 10-bit zero g value, used when encoding samples.
    #[must_use]
    pub const fn zero_g(&self) -> u16 {
        self.x_zero_offset
    }

    /// 10-bit one g value, used when encoding samples.
    #[must_use]
    pub const fn one_g(&self) -> u16 {
        self.x_gravity
    }

    /// Returns the acceleration in g from a raw 10-bit sample.
    #[must_use]
    pub fn get_acceleration(&self, data: &AccelData) -> (f64, f64, f64) {
        let x = normalize(data.x, 10, self.x_zero_offset, self.x_gravity, 10);
        let y = normalize(data.y, 10, self.y_zero_offset, self.y_gravity, 10);
        let z = normalize(data.z, 10, self.z_zero_offset, self.z_gravity, 10);
        (x, y, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_single_byte() {
        let mut data = [0x80, 0x80, 0x80, 0x00, 0x9A, 0x9A, 0x9A, 0x00, 0x00, 0x00];
        update_calibration_checksum(&mut data, 1);

        let expected = data[..9]
            .iter()
            .fold(0x55u8, |sum, byte| sum.wrapping_add(*byte));
        assert_eq!(data[9], expected);
        assert!(verify_calibration_checksum(&data, 1));

        data[4] = 0x9B;
        assert!(!verify_calibration_checksum(&data, 1));
    }

    #[test]
    fn test_checksum_two_bytes() {
        let mut data = [0u8; 16];
        data[0] = 0x10;
        update_calibration_checksum(&mut data, 2);
        assert_eq!(data[14], 0x65);
        assert_eq!(data[15], 0xBA);
        assert!(verify_calibration_checksum(&data, 2));
    }

    #[test]
    fn test_calibration_bytes_roundtrip() {
        let calibration = AccelerometerCalibration::new(0x201, 0x26B);
        let mut bytes = [0u8; 8];
        calibration.write_bytes(&mut bytes);
        assert_eq!(bytes[0], 0x80);
        assert_eq!(bytes[3], 0b0001_0101);
        assert_eq!(AccelerometerCalibration::from_bytes(&bytes), Some(calibration));
    }

    #[test]
    fn test_gravity_converts_to_one_g() {
        let calibration = AccelerometerCalibration::default();
        let data = convert_accel_data(
            Vec3::new(0.0, 0.0, GRAVITY_ACCELERATION),
            calibration.zero_g(),
            calibration.one_g(),
            10,
        );
        assert_eq!(data.x, calibration.zero_g());
        assert_eq!(data.z, calibration.one_g());

        let (x, y, z) = calibration.get_acceleration(&data);
        assert!(x.abs() < 1e-9 && y.abs() < 1e-9);
        assert!((z - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_conversion_saturates() {
        let data = convert_accel_data(Vec3::new(1000.0, -1000.0, 0.0), 0x200, 0x268, 10);
        assert_eq!(data.x, 0x3FF);
        assert_eq!(data.y, 0);
    }
}
