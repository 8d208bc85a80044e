//! Simulation state: bike bodies, control inputs and step outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{
    BIKE_OFFSET_X, BIKE_OFFSET_Y, FINISH, HEAD_OFFSET, START, WHEEL_BASE,
};
use crate::physics::finish_distance_sq;

/// Acceleration input held for a frame. The two gas directions drive one
/// wheel each; braking opposes both wheels' spin relative to the bike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Accel {
    #[default]
    Idle,
    GasLeft,
    GasRight,
    Brake,
}

impl Accel {
    /// Two-bit field value inside an update code.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Idle => 0,
            Self::GasLeft => 1,
            Self::GasRight => 2,
            Self::Brake => 3,
        }
    }

    #[must_use]
    pub const fn from_code(code: u16) -> Self {
        match code % 4 {
            1 => Self::GasLeft,
            2 => Self::GasRight,
            3 => Self::Brake,
            _ => Self::Idle,
        }
    }

    /// The opposite gas direction; used by the solver's toggle commands.
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::GasLeft => Self::GasRight,
            Self::GasRight => Self::GasLeft,
            other => other,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::GasLeft => "gas-left",
            Self::GasRight => "gas-right",
            Self::Brake => "brake",
        }
    }
}

impl fmt::Display for Accel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rotation request for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    #[default]
    None,
    Cw,
    Ccw,
}

impl Rotation {
    /// Field value inside an update code (base-3 digit).
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::None => 0,
            Self::Cw => 1,
            Self::Ccw => 2,
        }
    }

    #[must_use]
    pub const fn from_code(code: u16) -> Self {
        match code % 3 {
            1 => Self::Cw,
            2 => Self::Ccw,
            _ => Self::None,
        }
    }
}

/// Outcome of advancing one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepResult {
    Continue,
    Success,
    Failure,
}

/// One rigid body: position and velocity in ticks, plus angular state
/// for the bodies that spin (the head leaves the angular fields at zero).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    pub pos: [i32; 2],
    pub vel: [i32; 2],
    pub ang_pos: i32,
    pub ang_vel: i32,
}

/// Full per-frame simulation state, mutated only by the physics stepper
/// and reset to the world's initial snapshot on restart or rewind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BikeState {
    pub frame: i32,
    /// Frame of the last accepted rotation; rotations inside the cooldown
    /// window after it are rejected.
    pub last_rotate: i32,
    pub rotation: Rotation,
    pub accel: Accel,
    pub dead: bool,
    /// Wraparound-aware squared distance to the finish, refreshed every
    /// frame for the solver regardless of outcome.
    pub finish_dist_sq: i64,
    pub bike: Body,
    pub wheels: [Body; 2],
    pub head: Body,
}

impl BikeState {
    /// Initial snapshot shared by every world: wheels on the start point,
    /// bike centre and head stacked above the left wheel.
    #[must_use]
    pub fn initial() -> Self {
        let wheel0 = Body {
            pos: START,
            ..Body::default()
        };
        let wheel1 = Body {
            pos: [START[0].wrapping_add(WHEEL_BASE), START[1]],
            ..Body::default()
        };
        let bike = Body {
            pos: [
                wheel0.pos[0].wrapping_add(BIKE_OFFSET_X),
                wheel0.pos[1].wrapping_add(BIKE_OFFSET_Y),
            ],
            ..Body::default()
        };
        let head = Body {
            pos: [bike.pos[0], bike.pos[1].wrapping_add(HEAD_OFFSET)],
            ..Body::default()
        };
        Self {
            frame: 0,
            last_rotate: -10_000,
            rotation: Rotation::None,
            accel: Accel::Idle,
            dead: false,
            finish_dist_sq: finish_distance_sq(bike.pos, FINISH),
            bike,
            wheels: [wheel0, wheel1],
            head,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accel_codes_roundtrip() {
        for a in [Accel::Idle, Accel::GasLeft, Accel::GasRight, Accel::Brake] {
            assert_eq!(Accel::from_code(a.code()), a);
        }
        for r in [Rotation::None, Rotation::Cw, Rotation::Ccw] {
            assert_eq!(Rotation::from_code(r.code()), r);
        }
    }

    #[test]
    fn gas_flips_between_directions() {
        assert_eq!(Accel::GasLeft.flipped(), Accel::GasRight);
        assert_eq!(Accel::GasRight.flipped(), Accel::GasLeft);
        assert_eq!(Accel::Brake.flipped(), Accel::Brake);
    }

    #[test]
    fn initial_state_geometry_holds() {
        let s = BikeState::initial();
        assert_eq!(s.frame, 0);
        assert!(!s.dead);
        assert_eq!(
            s.wheels[1].pos[0].wrapping_sub(s.wheels[0].pos[0]),
            WHEEL_BASE
        );
        assert_eq!(s.head.pos[1].wrapping_sub(s.bike.pos[1]), HEAD_OFFSET);
    }
}
