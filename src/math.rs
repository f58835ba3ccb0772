use std::ops::{Add, AddAssign, Mul, Neg, Sub};

pub const TAU: f32 = std::f32::consts::TAU;

/// Standard gravity in m/s².
pub const GRAVITY_ACCELERATION: f32 = 9.806_65;

/// Axes follow the remote: `x` right, `y` forward (pointing direction), `z` up.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.z.mul_add(other.z, self.x.mul_add(other.x, self.y * other.y))
    }

    #[must_use]
    pub fn map(self, f: impl Fn(f32) -> f32) -> Self {
        Self::new(f(self.x), f(self.y), f(self.z))
    }

    #[must_use]
    pub fn zip(self, other: Self, f: impl Fn(f32, f32) -> f32) -> Self {
        Self::new(f(self.x, other.x), f(self.y, other.y), f(self.z, other.z))
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a + b)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a - b)
    }
}

impl Neg for Vec3 {
    type Output = Self;

    fn neg(self) -> Self {
        self.map(|v| -v)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        self.map(|v| v * rhs)
    }
}

/// Row-major 3x3 rotation matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix33 {
    pub data: [[f32; 3]; 3],
}

impl Default for Matrix33 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix33 {
    pub const IDENTITY: Self = Self {
        data: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    #[must_use]
    pub fn rotate_x(rad: f32) -> Self {
        let (s, c) = rad.sin_cos();
        Self {
            data: [[1.0, 0.0, 0.0], [0.0, c, -s], [0.0, s, c]],
        }
    }

    #[must_use]
    pub fn rotate_y(rad: f32) -> Self {
        let (s, c) = rad.sin_cos();
        Self {
            data: [[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]],
        }
    }

    #[must_use]
    pub fn rotate_z(rad: f32) -> Self {
        let (s, c) = rad.sin_cos();
        Self {
            data: [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// Rotation applying `angle.x` (pitch), then `angle.y` (roll), then `angle.z` (yaw).
    #[must_use]
    pub fn from_angles(angle: Vec3) -> Self {
        Self::rotate_z(angle.z) * Self::rotate_y(angle.y) * Self::rotate_x(angle.x)
    }

    #[must_use]
    pub fn transposed(&self) -> Self {
        let d = &self.data;
        Self {
            data: [
                [d[0][0], d[1][0], d[2][0]],
                [d[0][1], d[1][1], d[2][1]],
                [d[0][2], d[1][2], d[2][2]],
            ],
        }
    }
}

impl Mul for Matrix33 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let mut data = [[0.0; 3]; 3];
        for (i, row) in data.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = (0..3).map(|k| self.data[i][k] * rhs.data[k][j]).sum();
            }
        }
        Self { data }
    }
}

impl Mul<Vec3> for Matrix33 {
    type Output = Vec3;

    fn mul(self, v: Vec3) -> Vec3 {
        let row = |r: [f32; 3]| Vec3::new(r[0], r[1], r[2]).dot(v);
        Vec3::new(row(self.data[0]), row(self.data[1]), row(self.data[2]))
    }
}

/// Rotation plus translation, applied as `rotation * (point + translation)`.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Transform {
    pub rotation: Matrix33,
    pub translation: Vec3,
}

impl Transform {
    #[must_use]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * (point + self.translation)
    }

    #[must_use]
    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation * vector
    }
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    (1.0 - t).mul_add(a, b * t)
}

pub fn inverse_lerp(a: f32, b: f32, t: f32) -> f32 {
    (t - a) / (b - a)
}

pub fn remap(value: f32, from_start: f32, from_end: f32, to_start: f32, to_end: f32) -> f32 {
    let t = inverse_lerp(from_start, from_end, value);
    lerp(to_start, to_end, t)
}

/// Maps a -1..=1 value onto an unsigned `bits` wide range around `center`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn to_unsigned_axis(value: f32, center: u8, radius: u8, bits: u32) -> u8 {
    let max = ((1u32 << bits) - 1) as f32;
    let raw = f32::from(radius).mul_add(value.clamp(-1.0, 1.0), f32::from(center));
    raw.round().clamp(0.0, max) as u8
}
