//! The IR camera, tracking the two sensor bar light clusters.

use crate::bus::{I2cSlave, RegisterBlock};
use crate::math::{Transform, Vec3, TAU};

pub const I2C_ADDR: u8 = 0x58;

pub const CAMERA_RES_X: u16 = 1024;
pub const CAMERA_RES_Y: u16 = 768;

/// Field of view of the sensor in radians.
pub const CAMERA_FOV_X: f32 = 42.0 / 360.0 * TAU;
pub const CAMERA_FOV_Y: f32 = 31.0 / 360.0 * TAU;

// Factory IR calibration points.
pub const IR_LOW_X: u16 = 0x7F;
pub const IR_LOW_Y: u16 = 0x5D;
pub const IR_HIGH_X: u16 = 0x380;
pub const IR_HIGH_Y: u16 = 0x2A2;

/// Sensor bar position relative to the neutral remote, in meters.
pub const SENSOR_BAR_DISTANCE: f32 = 2.0;
pub const SENSOR_BAR_LED_SEPARATION: f32 = 0.2;

pub const REG_MODE: u8 = 0x33;
pub const REG_DATA: u8 = 0x37;
const CAMERA_DATA_SIZE: usize = 36;
const NUM_POINTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrFormat {
    Basic,
    Extended,
    Full,
    Unknown(u8),
}

impl From<u8> for IrFormat {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Basic,
            3 => Self::Extended,
            5 => Self::Full,
            other => Self::Unknown(other),
        }
    }
}

/// A light cluster in sensor pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrPoint {
    pub x: u16,
    pub y: u16,
    pub size: u8,
}

#[derive(Debug, Default)]
pub struct CameraLogic {
    registers: RegisterBlock,
    enabled: bool,
}

impl CameraLogic {
    pub fn reset(&mut self) {
        self.registers.clear();
        self.enabled = false;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn format(&self) -> IrFormat {
        IrFormat::from(self.registers.get(REG_MODE))
    }

    /// Projects the sensor bar through the inverse remote transformation.
    ///
    /// The remote looks along +y with +z up.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    #[must_use]
    pub fn project(transform: &Transform) -> Vec<IrPoint> {
        let half_x = (CAMERA_FOV_X / 2.0).tan();
        let half_y = (CAMERA_FOV_Y / 2.0).tan();
        let leds = [
            Vec3::new(-SENSOR_BAR_LED_SEPARATION / 2.0, SENSOR_BAR_DISTANCE, 0.0),
            Vec3::new(SENSOR_BAR_LED_SEPARATION / 2.0, SENSOR_BAR_DISTANCE, 0.0),
        ];

        leds.iter()
            .filter_map(|led| {
                let point = transform.transform_point(*led);
                if point.y <= 0.0 {
                    return None;
                }
                let nx = point.x / (point.y * half_x);
                let ny = point.z / (point.y * half_y);
                if !(-1.0..1.0).contains(&nx) || !(-1.0..1.0).contains(&ny) {
                    return None;
                }
                Some(IrPoint {
                    x: to_pixel(nx, CAMERA_RES_X),
                    y: to_pixel(ny, CAMERA_RES_Y),
                    size: (6.0 / point.y).round().clamp(1.0, 15.0) as u8,
                })
            })
            .collect()
    }

    /// Refreshes the data registers for the current remote transformation.
    #[allow(clippy::cast_possible_truncation)]
    pub fn update(&mut self, transform: &Transform) {
        if !self.enabled {
            return;
        }

        let points = Self::project(transform);
        let point = |i: usize| points.get(i).copied();
        let mut data = [0xFFu8; CAMERA_DATA_SIZE];

        match self.format() {
            IrFormat::Basic => {
                for (pair, chunk) in data[..10].chunks_exact_mut(5).enumerate() {
                    let first = point(pair * 2);
                    let second = point(pair * 2 + 1);
                    let (x1, y1) = first.map_or((0x3FF, 0x3FF), |p| (p.x, p.y));
                    let (x2, y2) = second.map_or((0x3FF, 0x3FF), |p| (p.x, p.y));
                    chunk[0] = x1 as u8;
                    chunk[1] = y1 as u8;
                    chunk[2] = (((y1 >> 8) << 6) | ((x1 >> 8) << 4) | ((y2 >> 8) << 2) | (x2 >> 8))
                        as u8;
                    chunk[3] = x2 as u8;
                    chunk[4] = y2 as u8;
                }
            }
            IrFormat::Extended => {
                for (i, chunk) in data[..12].chunks_exact_mut(3).enumerate() {
                    if let Some(p) = point(i) {
                        chunk[0] = p.x as u8;
                        chunk[1] = p.y as u8;
                        chunk[2] = (((p.y >> 8) << 6) | ((p.x >> 8) << 4)) as u8 | (p.size & 0x0F);
                    }
                }
            }
            IrFormat::Full => {
                for (i, chunk) in data.chunks_exact_mut(9).enumerate().take(NUM_POINTS) {
                    if let Some(p) = point(i) {
                        chunk[0] = p.x as u8;
                        chunk[1] = p.y as u8;
                        chunk[2] = (((p.y >> 8) << 6) | ((p.x >> 8) << 4)) as u8 | (p.size & 0x0F);
                        // Bounding box is not emulated.
                        chunk[3..8].fill(0);
                        chunk[8] = 0xFF;
                    }
                }
            }
            IrFormat::Unknown(mode) => {
                tracing::trace!(mode, "unknown IR mode");
            }
        }

        self.registers.write(REG_DATA, &data);
    }
}

impl I2cSlave for CameraLogic {
    fn bus_read(&mut self, slave_addr: u8, addr: u8, out: &mut [u8]) -> usize {
        if slave_addr != I2C_ADDR || !self.enabled {
            return 0;
        }
        self.registers.read(addr, out)
    }

    fn bus_write(&mut self, slave_addr: u8, addr: u8, data: &[u8]) -> usize {
        if slave_addr != I2C_ADDR || !self.enabled {
            return 0;
        }
        self.registers.write(addr, data)
    }
}

/// Maps a normalized coordinate in -1..=1 to a pixel, +1 being pixel 0.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_pixel(normalized: f32, resolution: u16) -> u16 {
    let pixel = (1.0 - normalized) * f32::from(resolution / 2);
    (pixel as u16).min(resolution - 1)
}
