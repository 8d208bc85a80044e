//! Solver-side control timelines.
//!
//! The solver searches over sparse command lists rather than raw update
//! codes; compiling a timeline applies the same cooldown gating the
//! stepper enforces, so every compiled stream replays cleanly.

use crate::constants::{ROTATION_COOLDOWN, THROTTLE_OPEN_FRAME};
use crate::pow::ProofOfWork;
use crate::state::{Accel, Rotation};

/// What a command does when its frame arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Rotate(Rotation),
    /// Swap the gas between the two wheels.
    Toggle,
}

/// One timed command in a candidate timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub time: i32,
    pub kind: CommandKind,
}

/// Whether a rotation (or toggle) issued `now` clears the cooldown since
/// the last accepted one. Shared with the interactive stepper so both
/// sides gate inputs identically.
#[must_use]
pub const fn rotation_ready(last: i32, now: i32) -> bool {
    now - last >= ROTATION_COOLDOWN
}

/// Compile a time-sorted command list into `pow`'s update stream.
///
/// The stream always opens with the throttle on the forward wheel;
/// commands that land inside a cooldown window are dropped rather than
/// recorded, mirroring what the stepper would reject.
pub fn compile_commands(commands: &[Command], pow: &mut ProofOfWork, target_frames: i32) {
    pow.updates.clear();
    pow.num_frames = target_frames - 1;

    let mut accel = Accel::GasRight;
    let mut last_rotate = -ROTATION_COOLDOWN;
    let mut last_toggle = -ROTATION_COOLDOWN;
    pow.record_update(THROTTLE_OPEN_FRAME, accel, Rotation::None);

    for cmd in commands {
        let mut rotation = Rotation::None;
        match cmd.kind {
            CommandKind::Rotate(r) => {
                if rotation_ready(last_rotate, cmd.time) {
                    last_rotate = cmd.time;
                    rotation = r;
                }
            }
            CommandKind::Toggle => {
                if rotation_ready(last_toggle, cmd.time) {
                    last_toggle = cmd.time;
                    accel = accel.flipped();
                }
            }
        }
        if !pow.record_update(cmd.time, accel, rotation) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pow::UpdateCode;

    #[test]
    fn cooldown_gate_is_inclusive() {
        assert!(rotation_ready(0, ROTATION_COOLDOWN));
        assert!(!rotation_ready(0, ROTATION_COOLDOWN - 1));
        assert!(rotation_ready(-ROTATION_COOLDOWN, 0));
    }

    #[test]
    fn compiled_stream_opens_with_throttle() {
        let mut pow = ProofOfWork::new(0);
        compile_commands(&[], &mut pow, 7_500);
        assert_eq!(pow.num_frames, 7_499);
        assert_eq!(pow.updates.len(), 1);
        let code = UpdateCode::decode(pow.updates[0]);
        assert_eq!(i32::from(code.frame_delta), THROTTLE_OPEN_FRAME);
        assert_eq!(code.accel, Accel::GasRight);
    }

    #[test]
    fn rotations_inside_cooldown_are_dropped() {
        let commands = [
            Command {
                time: 1_000,
                kind: CommandKind::Rotate(Rotation::Ccw),
            },
            Command {
                time: 1_000 + ROTATION_COOLDOWN / 2,
                kind: CommandKind::Rotate(Rotation::Cw),
            },
            Command {
                time: 1_000 + ROTATION_COOLDOWN,
                kind: CommandKind::Rotate(Rotation::Cw),
            },
        ];
        let mut pow = ProofOfWork::new(0);
        compile_commands(&commands, &mut pow, 7_500);
        let rotations: Vec<Rotation> = pow
            .updates
            .iter()
            .map(|&u| UpdateCode::decode(u).rotation)
            .collect();
        assert_eq!(
            rotations,
            [Rotation::None, Rotation::Ccw, Rotation::Cw],
            "middle command falls inside the cooldown"
        );
    }

    #[test]
    fn toggles_alternate_the_gas() {
        let commands = [
            Command {
                time: 1_000,
                kind: CommandKind::Toggle,
            },
            Command {
                time: 2_000,
                kind: CommandKind::Toggle,
            },
        ];
        let mut pow = ProofOfWork::new(0);
        compile_commands(&commands, &mut pow, 7_500);
        assert_eq!(pow.updates.len(), 3);
        assert_eq!(UpdateCode::decode(pow.updates[1]).accel, Accel::GasLeft);
        assert_eq!(UpdateCode::decode(pow.updates[2]).accel, Accel::GasRight);
    }
}
