//! Vehicle Input
//!
//! Per-tick input from the movement/input collaborator.
//! Uses lookup table (MOVE_LUT) for exact i8 to Fixed conversion.

use serde::{Serialize, Deserialize};
use crate::core::fixed::Fixed;
use crate::core::vec2::FixedVec2;
use crate::game::state::PlayerId;

// =============================================================================
// AXIS LOOKUP TABLE (Critical for Determinism)
// =============================================================================

/// Lookup table for converting i8 axis input to Fixed.
///
/// # Why a Lookup Table?
///
/// Converting i8 [-127..+127] to Fixed [-1.0..+1.0] requires
/// `value * 65536 / 127`, which is not an integer multiple. The table
/// precomputes all 256 floor-divided values.
///
/// # Special Values
///
/// - Index 128 (-128 as i8) = 0 (represents "no input" / stick released)
pub static MOVE_LUT: [Fixed; 256] = {
    let mut lut = [0i32; 256];
    let mut i = 0i32;
    while i < 256 {
        // Treat as signed: 0..127 = positive, 128..255 = negative (-128..-1)
        let signed = if i < 128 { i } else { i - 256 };

        if signed == -128 {
            lut[i as usize] = 0;
        } else {
            lut[i as usize] = (signed * 65536) / 127;
        }
        i += 1;
    }
    lut
};

/// Convert i8 axis input to Fixed using lookup table.
#[inline]
pub fn move_to_fixed(input: i8) -> Fixed {
    MOVE_LUT[(input as u8) as usize]
}

// =============================================================================
// INPUT TYPES
// =============================================================================

/// Input for one vehicle for one tick.
///
/// NO tick field - tick is stored separately for compression.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFrame {
    /// Throttle: -127 (reverse) to +127 (forward), -128 = released
    pub move_axis: i8,

    /// Steering: -127 (left) to +127 (right), -128 = released
    pub steer_axis: i8,

    /// Aim direction X component on the ground plane, -128 = no aim
    pub aim_x: i8,

    /// Aim direction Z component on the ground plane, -128 = no aim
    pub aim_z: i8,

    /// Action flags (packed bits):
    /// - Bit 0: Fire intent
    /// - Bit 1: Brake intent
    pub flags: u8,
}

impl InputFrame {
    /// Special value indicating no input (stick released)
    pub const NO_INPUT: i8 = -128;

    /// Fire flag bit
    pub const FLAG_FIRE: u8 = 0x01;

    /// Brake flag bit
    pub const FLAG_BRAKE: u8 = 0x02;

    /// Create a new idle input frame.
    pub const fn new() -> Self {
        Self {
            move_axis: Self::NO_INPUT,
            steer_axis: Self::NO_INPUT,
            aim_x: Self::NO_INPUT,
            aim_z: Self::NO_INPUT,
            flags: 0,
        }
    }

    /// Create input with throttle and steering.
    pub const fn with_drive(move_axis: i8, steer_axis: i8) -> Self {
        Self {
            move_axis,
            steer_axis,
            aim_x: Self::NO_INPUT,
            aim_z: Self::NO_INPUT,
            flags: 0,
        }
    }

    /// Builder: set aim direction components.
    pub const fn aimed(mut self, aim_x: i8, aim_z: i8) -> Self {
        self.aim_x = aim_x;
        self.aim_z = aim_z;
        self
    }

    /// Builder: set fire intent.
    pub const fn firing(mut self) -> Self {
        self.flags |= Self::FLAG_FIRE;
        self
    }

    /// Throttle as Fixed in [-1, 1].
    #[inline]
    pub fn throttle(&self) -> Fixed {
        move_to_fixed(self.move_axis)
    }

    /// Steering as Fixed in [-1, 1].
    #[inline]
    pub fn steer(&self) -> Fixed {
        move_to_fixed(self.steer_axis)
    }

    /// Normalized aim direction, or None when the aim is released or zero.
    pub fn aim_direction(&self) -> Option<FixedVec2> {
        if self.aim_x == Self::NO_INPUT || self.aim_z == Self::NO_INPUT {
            return None;
        }
        let raw = FixedVec2::new(move_to_fixed(self.aim_x), move_to_fixed(self.aim_z));
        let dir = raw.normalize();
        if dir == FixedVec2::ZERO {
            None
        } else {
            Some(dir)
        }
    }

    /// Check if fire was requested this frame.
    #[inline]
    pub fn fire_pressed(&self) -> bool {
        self.flags & Self::FLAG_FIRE != 0
    }

    /// Check if brake was requested this frame.
    #[inline]
    pub fn brake_pressed(&self) -> bool {
        self.flags & Self::FLAG_BRAKE != 0
    }

    /// Set fire flag.
    #[inline]
    pub fn set_fire(&mut self, pressed: bool) {
        if pressed {
            self.flags |= Self::FLAG_FIRE;
        } else {
            self.flags &= !Self::FLAG_FIRE;
        }
    }

    /// Set brake flag.
    #[inline]
    pub fn set_brake(&mut self, pressed: bool) {
        if pressed {
            self.flags |= Self::FLAG_BRAKE;
        } else {
            self.flags &= !Self::FLAG_BRAKE;
        }
    }
}

// =============================================================================
// INPUT RECORDING
// =============================================================================

/// Tick at which an input state began.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct InputDelta {
    /// Tick when this input state began
    pub tick: u32,
    /// The new input state
    pub frame: InputFrame,
}

/// Input recording for one vehicle, used for deterministic replay.
///
/// Only stores ticks where input CHANGED.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerInputBuffer {
    /// Player identifier
    pub player_id: PlayerId,

    /// Arena seed the recording was made against
    pub arena_seed: u64,

    deltas: Vec<InputDelta>,

    #[serde(skip)]
    last_frame: InputFrame,
}

impl PlayerInputBuffer {
    /// Create a new input buffer for a player.
    pub fn new(player_id: PlayerId, arena_seed: u64) -> Self {
        Self {
            player_id,
            arena_seed,
            deltas: Vec::new(),
            last_frame: InputFrame::new(),
        }
    }

    /// Record input for a tick. Only stores if input changed.
    pub fn record(&mut self, tick: u32, frame: InputFrame) {
        if frame != self.last_frame {
            self.deltas.push(InputDelta { tick, frame });
            self.last_frame = frame;
        }
    }

    /// Input in effect at a specific tick.
    pub fn get_input_at(&self, tick: u32) -> InputFrame {
        let idx = self.deltas.partition_point(|d| d.tick <= tick);
        if idx == 0 {
            InputFrame::new()
        } else {
            self.deltas[idx - 1].frame
        }
    }

    /// Number of delta entries.
    pub fn delta_count(&self) -> usize {
        self.deltas.len()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::FIXED_ONE;

    #[test]
    fn test_move_lut_values() {
        assert_eq!(MOVE_LUT[0], 0);
        assert_eq!(MOVE_LUT[127], 65536);
        assert_eq!(MOVE_LUT[129], -65536);
        assert_eq!(MOVE_LUT[128], 0);

        for i in 1..=127 {
            let pos = MOVE_LUT[i as usize];
            let neg = MOVE_LUT[(256 - i) as usize];
            assert_eq!(pos, -neg, "LUT should be symmetric for {}", i);
        }
    }

    #[test]
    fn test_input_frame_flags() {
        let mut frame = InputFrame::new();
        assert!(!frame.fire_pressed());
        assert!(!frame.brake_pressed());

        frame.set_fire(true);
        assert!(frame.fire_pressed());
        frame.set_brake(true);
        assert!(frame.brake_pressed());
        frame.set_fire(false);
        assert!(!frame.fire_pressed());
        assert!(frame.brake_pressed());
    }

    #[test]
    fn test_aim_direction() {
        assert_eq!(InputFrame::new().aim_direction(), None);
        assert_eq!(InputFrame::new().aimed(0, 0).aim_direction(), None);

        let dir = InputFrame::new().aimed(127, 0).aim_direction();
        assert_eq!(dir, Some(FixedVec2::new(FIXED_ONE, 0)));

        let diag = InputFrame::new().aimed(60, 60).aim_direction();
        let len = diag.map(|d| d.length()).unwrap_or(0);
        assert!((len - FIXED_ONE).abs() < 16);
    }

    #[test]
    fn test_drive_axes() {
        let frame = InputFrame::with_drive(127, -127);
        assert_eq!(frame.throttle(), FIXED_ONE);
        assert_eq!(frame.steer(), -FIXED_ONE);
        assert_eq!(InputFrame::new().throttle(), 0);
    }

    #[test]
    fn test_input_buffer_delta_compression() {
        let mut buffer = PlayerInputBuffer::new(PlayerId::new([0u8; 16]), 10);

        let frame = InputFrame::with_drive(100, 50);
        buffer.record(0, frame);
        buffer.record(1, frame);
        buffer.record(2, frame);
        assert_eq!(buffer.delta_count(), 1);

        let fire = frame.firing();
        buffer.record(5, fire);
        assert_eq!(buffer.delta_count(), 2);

        assert_eq!(buffer.get_input_at(3), frame);
        assert_eq!(buffer.get_input_at(5), fire);
        assert_eq!(buffer.get_input_at(900), fire);
    }

    #[test]
    fn test_input_buffer_before_first_delta() {
        let mut buffer = PlayerInputBuffer::new(PlayerId::new([1u8; 16]), 10);
        buffer.record(10, InputFrame::with_drive(1, 1));
        assert_eq!(buffer.get_input_at(0), InputFrame::new());
    }
}
