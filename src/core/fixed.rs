//! Q16.16 Fixed-Point Arithmetic
//!
//! Deterministic fixed-point math for the arena simulation.
//! All gameplay operations use integer arithmetic only - no floats in the tick.
//!
//! ## Format: Q16.16
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Bit Layout: Q16.16 (32-bit signed integer)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  [S][IIIIIIIIIIIIIIII][FFFFFFFFFFFFFFFF]                    │
//! │   │  └──── 16 bits ────┘└──── 16 bits ────┘                 │
//! │   └─ Sign bit                                               │
//! │                                                             │
//! │  Range: -32768.0 to +32767.99998 (approx)                   │
//! │  Precision: 1/65536 ≈ 0.000015 units                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wide values
//!
//! A 25x25 maze of 15-unit cells spans 375 units, so squared distances
//! overflow i32 quickly. Squares and dot products are therefore carried as
//! `Wide` (i64, still Q16.16 scaled) and only narrowed back after a square
//! root.

/// Q16.16 fixed-point number stored as i32.
/// 16 bits integer, 16 bits fractional.
pub type Fixed = i32;

/// Q16.16 value widened to i64 for squared quantities.
pub type Wide = i64;

/// Number of fractional bits (16)
pub const FIXED_SCALE: i32 = 16;

/// 1.0 in fixed-point (65536)
pub const FIXED_ONE: Fixed = 1 << FIXED_SCALE; // 65536

/// 0.5 in fixed-point (32768)
pub const FIXED_HALF: Fixed = FIXED_ONE >> 1; // 32768

// =============================================================================
// TIMING (integer literal, no float conversion)
// =============================================================================

/// Tick duration: 1/60 second = round(65536/60) = 1092
pub const TICK_DURATION: Fixed = 1092;

// =============================================================================
// CORE OPERATIONS (All deterministic, wrapping semantics)
// =============================================================================

/// Convert a compile-time float to fixed-point.
///
/// # Warning
/// Only use at compile-time or initialization. NEVER in tick loop.
///
/// # Example
/// ```
/// use maze_arena::core::fixed::{to_fixed, FIXED_ONE};
/// const MY_VALUE: i32 = to_fixed(2.5);
/// assert_eq!(MY_VALUE, FIXED_ONE * 2 + FIXED_ONE / 2);
/// ```
#[inline]
pub const fn to_fixed(f: f64) -> Fixed {
    (f * (FIXED_ONE as f64)) as Fixed
}

/// Convert an integer number of units to fixed-point.
#[inline]
pub const fn from_int(i: i32) -> Fixed {
    i << FIXED_SCALE
}

/// Multiply two fixed-point numbers.
///
/// Uses i64 intermediate to prevent overflow, then truncates.
#[inline]
pub fn fixed_mul(a: Fixed, b: Fixed) -> Fixed {
    let wide = (a as i64) * (b as i64);
    (wide >> FIXED_SCALE) as Fixed
}

/// Multiply two fixed-point numbers, keeping the wide result.
#[inline]
pub fn wide_mul(a: Fixed, b: Fixed) -> Wide {
    ((a as i64) * (b as i64)) >> FIXED_SCALE
}

/// Divide two fixed-point numbers.
///
/// Pre-shifts numerator to maintain precision.
/// Returns 0 on divide-by-zero.
#[inline]
pub fn fixed_div(a: Fixed, b: Fixed) -> Fixed {
    if b == 0 {
        return 0; // Deterministic: don't panic
    }
    let wide = (a as i64) << FIXED_SCALE;
    (wide / b as i64) as Fixed
}

/// Divide two fixed-point numbers without narrowing.
///
/// Used for ray parameters, which can be huge when a direction component
/// is nearly zero. Returns `None` on divide-by-zero.
#[inline]
pub fn wide_div(a: Fixed, b: Fixed) -> Option<Wide> {
    if b == 0 {
        return None;
    }
    Some(((a as i64) << FIXED_SCALE) / b as i64)
}

/// Exact integer square root (floor) of an unsigned 64-bit value.
fn isqrt_u64(n: u64) -> u64 {
    if n < 2 {
        return n;
    }
    // Digit-by-digit method: fixed iteration count, no floats.
    let mut op = n;
    let mut res = 0u64;
    let mut one = 1u64 << 62;
    while one > op {
        one >>= 2;
    }
    while one != 0 {
        if op >= res + one {
            op -= res + one;
            res = (res >> 1) + one;
        } else {
            res >>= 1;
        }
        one >>= 2;
    }
    res
}

/// Square root of a wide Q16.16 value, narrowed to `Fixed`.
///
/// sqrt(v / 2^16) * 2^16 == sqrt(v * 2^16), computed exactly on integers.
/// Returns 0 for non-positive inputs.
#[inline]
pub fn wide_sqrt(x: Wide) -> Fixed {
    if x <= 0 {
        return 0;
    }
    let root = isqrt_u64((x as u64) << FIXED_SCALE);
    root.min(i32::MAX as u64) as Fixed
}

/// Move `current` toward `target` by at most `max_step`, never overshooting.
#[inline]
pub fn fixed_move_toward(current: Fixed, target: Fixed, max_step: Fixed) -> Fixed {
    if current < target {
        current.saturating_add(max_step).min(target)
    } else {
        current.saturating_sub(max_step).max(target)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_constants() {
        assert_eq!(FIXED_ONE, 65536);
        assert_eq!(FIXED_HALF, 32768);
        assert_eq!(FIXED_SCALE, 16);
        assert_eq!(TICK_DURATION, (FIXED_ONE + 30) / 60);
    }

    #[test]
    fn test_to_fixed() {
        assert_eq!(to_fixed(1.0), FIXED_ONE);
        assert_eq!(to_fixed(0.5), FIXED_HALF);
        assert_eq!(to_fixed(-1.0), -FIXED_ONE);
        assert_eq!(from_int(3), to_fixed(3.0));
    }

    #[test]
    fn test_fixed_mul_div() {
        assert_eq!(fixed_mul(to_fixed(2.0), to_fixed(3.0)), to_fixed(6.0));
        assert_eq!(fixed_mul(to_fixed(-2.0), to_fixed(3.0)), to_fixed(-6.0));
        assert_eq!(fixed_div(to_fixed(6.0), to_fixed(2.0)), to_fixed(3.0));
        assert_eq!(fixed_div(FIXED_ONE, 0), 0);
        assert_eq!(wide_div(FIXED_ONE, 0), None);
    }

    #[test]
    fn test_wide_mul_does_not_overflow() {
        // 400 * 400 = 160000 units, far beyond the i32 Q16.16 range.
        let w = wide_mul(from_int(400), from_int(400));
        assert_eq!(w, 160_000i64 << FIXED_SCALE);
    }

    #[test]
    fn test_sqrt_exact() {
        assert_eq!(wide_sqrt(to_fixed(4.0) as Wide), to_fixed(2.0));
        assert_eq!(wide_sqrt(FIXED_ONE as Wide), FIXED_ONE);
        assert_eq!(wide_sqrt(0), 0);
        assert_eq!(wide_sqrt(-(FIXED_ONE as Wide)), 0);
        assert_eq!(wide_sqrt(160_000i64 << FIXED_SCALE), from_int(400));
    }

    #[test]
    fn test_isqrt_floor() {
        for n in [0u64, 1, 2, 3, 4, 15, 16, 17, 1 << 40, u32::MAX as u64] {
            let r = isqrt_u64(n);
            assert!(r * r <= n);
            assert!((r + 1) * (r + 1) > n);
        }
    }

    #[test]
    fn test_move_toward() {
        assert_eq!(fixed_move_toward(0, FIXED_ONE, FIXED_HALF), FIXED_HALF);
        assert_eq!(fixed_move_toward(FIXED_HALF, FIXED_ONE, FIXED_ONE), FIXED_ONE);
        assert_eq!(fixed_move_toward(FIXED_ONE, 0, FIXED_HALF), FIXED_HALF);
        assert_eq!(fixed_move_toward(0, 0, FIXED_ONE), 0);
    }
}
