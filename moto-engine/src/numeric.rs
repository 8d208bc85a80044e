//! Integer fixed-point primitives backing the deterministic simulation.
//!
//! Everything in this module is a pure function of its integer inputs.
//! The physics must be bit-exact across independent builds, so there is
//! no floating point, no lookup-table initialization order to get wrong,
//! and no platform-dependent arithmetic anywhere below.

use crate::constants::INV_SQRT_CLAMP;

/// Q31 multiply: `(a * b) >> 31` in 64-bit intermediate.
#[inline]
#[must_use]
pub fn q31_mul(a: i32, b: i32) -> i32 {
    ((i64::from(a) * i64::from(b)) >> 31) as i32
}

/// Q16 multiply of a signed value by an unsigned Q16 weight.
#[inline]
#[must_use]
pub fn mul_q16(a: i32, b: u16) -> i32 {
    ((i64::from(a) * i64::from(b)) >> 16) as i32
}

/// Q16 multiply of two unsigned Q16 weights.
#[inline]
#[must_use]
pub fn mul_u16(a: u16, b: u16) -> u16 {
    ((u32::from(a) * u32::from(b)) >> 16) as u16
}

#[inline]
#[must_use]
pub const fn sign(v: i32) -> i32 {
    (0 < v) as i32 - (v < 0) as i32
}

/// Shift-based integer square root.
///
/// Slower than a float sqrt but exact and identical on every platform,
/// which is what the consensus arithmetic needs.
#[must_use]
pub fn isqrt(mut num: u64) -> u64 {
    let mut res: u64 = 0;
    let mut bit: u64 = 1 << 62;

    while bit > num {
        bit >>= 2;
    }
    while bit != 0 {
        if num >= res + bit {
            num -= res + bit;
            res = (res >> 1) + bit;
        } else {
            res >>= 1;
        }
        bit >>= 2;
    }
    res
}

/// Smoothstep weight `3t^2 - 2t^3` for `t = i / 65536`, scaled to Q16.
///
/// The top of the range wraps (`s(1.0)` is 65536, one past `u16::MAX`);
/// the wrap is part of the consensus terrain definition.
#[inline]
#[must_use]
pub fn smooth(i: u32) -> u16 {
    let i = u64::from(i);
    ((i * i * (3 * 65_536 - 2 * i)) >> 32) as u16
}

/// Half the smoothstep slope `3t(1 - t)`, scaled to Q16.
#[inline]
#[must_use]
pub fn smooth_slope_half(i: u32) -> u16 {
    let i = u64::from(i);
    ((3 * i * (65_536 - i)) >> 16) as u16
}

// Quarter-wave sine polynomial, Q31 output for input in [0, 16384] where
// 16384 is a quarter turn. Coefficients satisfy C1 - C3 + C5 == 2^31 so
// the quarter wave lands exactly on 1.0 before the clamp.
const SIN_C1: i64 = 3_373_259_426;
const SIN_C3: i64 = 1_387_197_337;
const SIN_C5: i64 = 161_421_559;

fn sin_quarter(a: i32) -> i32 {
    debug_assert!((0..=16_384).contains(&a));
    let t = i64::from(a); // Q14
    let t2 = (t * t) >> 14;
    let inner = SIN_C3 - ((t2 * SIN_C5) >> 14);
    let z = SIN_C1 - ((t2 * inner) >> 14);
    ((t * z) >> 14).min(i64::from(i32::MAX)) as i32
}

/// Sine of an angle on the 2^16-per-turn scale, Q31 result.
#[must_use]
pub fn sin16(a: i16) -> i32 {
    let a = i32::from(a);
    if a <= -16_384 {
        -sin_quarter(32_768 + a)
    } else if a < 0 {
        -sin_quarter(-a)
    } else if a < 16_384 {
        sin_quarter(a)
    } else {
        sin_quarter(32_768 - a)
    }
}

/// Cosine of an angle on the 2^16-per-turn scale, Q31 result.
#[must_use]
pub fn cos16(a: i16) -> i32 {
    let a = i32::from(a);
    if a <= -16_384 {
        -sin_quarter(-16_384 - a)
    } else if a < 0 {
        sin_quarter(16_384 + a)
    } else if a < 16_384 {
        sin_quarter(16_384 - a)
    } else {
        -sin_quarter(a - 16_384)
    }
}

/// Quantized reciprocal gradient length, `~2^30 / |grad|`.
///
/// The squared length is clamped into a fixed domain before the root so
/// that every implementation quantizes identically near-flat gradients.
#[must_use]
pub fn inv_grad_len(grad: [i32; 2]) -> i32 {
    let g2 = (i64::from(grad[0]) * i64::from(grad[0])
        + i64::from(grad[1]) * i64::from(grad[1]))
        >> 8;
    let idx = g2.min(INV_SQRT_CLAMP - 1);
    (17_592_186_036_224_u64 / isqrt((idx as u64 + 1) * 68_719_476_736)) as i32
}
