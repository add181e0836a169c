//! Target offset from the frame center and its two-byte wire form.

use std::fmt;

/// Largest magnitude sent to the controller on either axis.
pub const OFFSET_LIMIT: i32 = 125;

/// Signed pixel offset of a target from the frame center.
///
/// Positive `dx` is right of center, positive `dy` is below center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Offset {
    /// Horizontal offset in pixels.
    pub dx: i32,
    /// Vertical offset in pixels.
    pub dy: i32,
}

impl Offset {
    /// Creates an offset.
    pub const fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }

    /// Saturates each axis to `[-limit, limit]`.
    pub fn clamp(self, limit: i32) -> Self {
        Self {
            dx: self.dx.clamp(-limit, limit),
            dy: self.dy.clamp(-limit, limit),
        }
    }

    /// Encodes as `[dx, dy]`, each truncated to its low 8 bits.
    ///
    /// Only values in `-128..=127` survive the round trip; clamp first.
    pub fn to_wire(self) -> [u8; 2] {
        [self.dx as u8, self.dy as u8]
    }

    /// Decodes two bytes as signed 8-bit values.
    pub fn from_wire(bytes: [u8; 2]) -> Self {
        Self {
            dx: i32::from(bytes[0] as i8),
            dy: i32::from(bytes[1] as i8),
        }
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x = {}, y = {}", self.dx, self.dy)
    }
}

/// Offset of `center` from the middle of a `width` x `height` frame.
///
/// The center is floored to whole pixels and the frame middle uses integer
/// division, so a target at `(width / 2, height / 2)` yields `(0, 0)`.
pub fn compute_offset(center: (f32, f32), width: u32, height: u32) -> Offset {
    Offset {
        dx: center.0.floor() as i32 - (width / 2) as i32,
        dy: center.1.floor() as i32 - (height / 2) as i32,
    }
}
