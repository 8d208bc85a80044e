//! Proof verification by full re-simulation.
//!
//! There is no shortcut: the only way to check a proof is to regenerate
//! its world and drive the bike through every recorded frame. [`replay`]
//! is the pure consensus-side validator; [`replay_trim`] is the miner's
//! variant that also shrinks a freshly found solution to its actual
//! length. [`advance`] supports interactive or incremental stepping that
//! records inputs as it goes.

use log::debug;
use thiserror::Error;

use crate::constants::{MAX_FRAME_DELTA, MAX_FRAMES, MAX_UPDATES};
use crate::physics::step;
use crate::pow::{ProofOfWork, UpdateCode, Work};
use crate::state::{Accel, BikeState, Rotation, StepResult};
use crate::world::World;

/// Why a replay rejected a proof.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplayError {
    /// An update code lands on or past the claimed frame count.
    #[error("update stream overruns the claimed {num_frames} frames")]
    FrameOverrun { num_frames: i32 },
    /// A non-filler code changes nothing; honest encoders never emit one.
    #[error("redundant update code at index {index}")]
    RedundantUpdate { index: usize },
    /// The bike died before the stream ended.
    #[error("bike crashed at frame {frame}")]
    Crashed { frame: i32 },
    /// The run finished before the claimed frame count, so the claim is
    /// not the run that was recorded.
    #[error("finish reached before the claimed frame count")]
    EarlySuccess,
    /// The frame limit passed without reaching the finish.
    #[error("no finish within {limit} frames")]
    Timeout { limit: i32 },
    /// The stream ran out without the bike finishing.
    #[error("update stream ended without a finish")]
    Incomplete,
}

/// Replay `pow`'s update stream from `state`, requiring the run to finish
/// exactly on `pow.num_frames` with every code consumed. Neither the
/// proof nor the caller's copy of it is mutated.
pub fn replay(
    state: &mut BikeState,
    pow: &ProofOfWork,
    world: &World,
    to_frame: i32,
) -> Result<(), ReplayError> {
    let mut accel = Accel::Idle;
    let mut rotation = Rotation::None;
    let mut boundary = 0;

    for i in 0..=pow.updates.len() {
        let (target, next) = if i == pow.updates.len() {
            (pow.num_frames, None)
        } else {
            let code = UpdateCode::decode(pow.updates[i]);
            boundary += i32::from(code.frame_delta);
            if boundary >= pow.num_frames {
                return Err(ReplayError::FrameOverrun {
                    num_frames: pow.num_frames,
                });
            }
            // Filler codes carry the maximal delta; anything shorter must
            // change an input.
            if code.frame_delta != MAX_FRAME_DELTA
                && code.accel == accel
                && code.rotation == Rotation::None
            {
                return Err(ReplayError::RedundantUpdate { index: i });
            }
            (boundary, Some(code))
        };

        while state.frame < target {
            match step(state, world, accel, rotation) {
                StepResult::Continue => {}
                StepResult::Success => {
                    if state.frame == pow.num_frames && i == pow.updates.len() {
                        return Ok(());
                    }
                    return Err(ReplayError::EarlySuccess);
                }
                StepResult::Failure => {
                    return Err(ReplayError::Crashed { frame: state.frame });
                }
            }
            rotation = Rotation::None;
            if state.frame >= to_frame {
                return Err(ReplayError::Timeout { limit: to_frame });
            }
        }

        if let Some(code) = next {
            accel = code.accel;
            rotation = code.rotation;
        }
    }

    Err(ReplayError::Incomplete)
}

/// Miner-side replay of a candidate: on success, trim the proof to the
/// frame the finish actually happened on and drop unused codes.
pub fn replay_trim(
    state: &mut BikeState,
    pow: &mut ProofOfWork,
    world: &World,
    to_frame: i32,
) -> Result<(), ReplayError> {
    let mut accel = Accel::Idle;
    let mut rotation = Rotation::None;
    let mut boundary = 0;

    for i in 0..=pow.updates.len() {
        let (target, next) = if i == pow.updates.len() {
            (pow.num_frames, None)
        } else {
            let code = UpdateCode::decode(pow.updates[i]);
            boundary += i32::from(code.frame_delta);
            (boundary.min(pow.num_frames), Some(code))
        };

        while state.frame < target {
            match step(state, world, accel, rotation) {
                StepResult::Continue => {}
                StepResult::Success => {
                    pow.num_frames = state.frame;
                    pow.updates.truncate(i);
                    return Ok(());
                }
                StepResult::Failure => {
                    return Err(ReplayError::Crashed { frame: state.frame });
                }
            }
            rotation = Rotation::None;
            if state.frame >= to_frame {
                return Err(ReplayError::Timeout { limit: to_frame });
            }
        }

        if let Some(code) = next {
            accel = code.accel;
            rotation = code.rotation;
        }
    }

    Err(ReplayError::Incomplete)
}

/// Full consensus check of a claimed solution against its work: bounds
/// on the stream, world regeneration at the claimed nonce, and a pure
/// replay that must land exactly on the claimed frame.
#[must_use]
pub fn check(work: &Work, pow: &ProofOfWork) -> bool {
    if pow.updates.len() > MAX_UPDATES {
        return false;
    }
    if pow.num_frames <= 0 || pow.num_frames >= work.target_frames {
        return false;
    }
    let world = World::generate(&work.block, pow.nonce);
    let mut state = BikeState::initial();
    match replay(&mut state, pow, &world, MAX_FRAMES + 10) {
        Ok(()) => true,
        Err(e) => {
            debug!("proof rejected: {e}");
            false
        }
    }
}

/// Step `frames` frames interactively, recording the inputs into `pow`.
/// A rotation request inside the cooldown window is held, not dropped:
/// it engages (and is recorded) on the first frame the cooldown lapses
/// within this call. A full update stream pins the accelerator to the
/// last recorded value so the recording stays faithful.
pub fn advance(
    state: &mut BikeState,
    pow: &mut ProofOfWork,
    world: &World,
    mut accel: Accel,
    rotation: Rotation,
    frames: i32,
) -> StepResult {
    use crate::control::rotation_ready;

    if !pow.record_update(state.frame, accel, Rotation::None) {
        debug!("update stream full at frame {}", state.frame);
        accel = pow.last_accel();
    }

    let mut pending = rotation;
    for _ in 0..frames {
        let mut engage = Rotation::None;
        if pending != Rotation::None && rotation_ready(state.last_rotate, state.frame + 1) {
            if pow.record_update(state.frame, accel, pending) {
                engage = pending;
            } else {
                debug!("update stream full at frame {}", state.frame);
            }
            pending = Rotation::None;
        }
        let result = step(state, world, accel, engage);
        pow.num_frames = state.frame;
        if result != StepResult::Continue {
            return result;
        }
    }
    StepResult::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{MAX_FRAME_DELTA, ROTATION_COOLDOWN, WORK_SIZE};

    fn playable() -> (World, BikeState, u32) {
        World::generate_playable(&[0x17; WORK_SIZE], 0, 100_000).expect("playable world")
    }

    #[test]
    fn redundant_code_is_rejected() {
        let (world, mut state, nonce) = playable();
        let mut pow = ProofOfWork::new(nonce);
        pow.num_frames = 1_000;
        pow.updates = vec![
            UpdateCode {
                frame_delta: 100,
                rotation: Rotation::None,
                accel: Accel::GasRight,
            }
            .encode(),
            // Same accel, no rotation, not a filler: changes nothing.
            UpdateCode {
                frame_delta: 100,
                rotation: Rotation::None,
                accel: Accel::GasRight,
            }
            .encode(),
        ];
        assert_eq!(
            replay(&mut state, &pow, &world, MAX_FRAMES),
            Err(ReplayError::RedundantUpdate { index: 1 })
        );
    }

    #[test]
    fn filler_codes_are_exempt_from_redundancy() {
        let (world, mut state, nonce) = playable();
        let mut pow = ProofOfWork::new(nonce);
        pow.num_frames = 2 * i32::from(MAX_FRAME_DELTA);
        pow.updates = vec![
            UpdateCode {
                frame_delta: MAX_FRAME_DELTA,
                rotation: Rotation::None,
                accel: Accel::Idle,
            }
            .encode(),
        ];
        let err = replay(&mut state, &pow, &world, MAX_FRAMES).unwrap_err();
        assert!(
            !matches!(err, ReplayError::RedundantUpdate { .. }),
            "maximal-delta filler must pass the redundancy check, got {err}"
        );
    }

    #[test]
    fn overrun_stream_is_rejected() {
        let (world, mut state, nonce) = playable();
        let mut pow = ProofOfWork::new(nonce);
        pow.num_frames = 50;
        pow.updates = vec![
            UpdateCode {
                frame_delta: 50,
                rotation: Rotation::None,
                accel: Accel::Brake,
            }
            .encode(),
        ];
        assert_eq!(
            replay(&mut state, &pow, &world, MAX_FRAMES),
            Err(ReplayError::FrameOverrun { num_frames: 50 })
        );
    }

    #[test]
    fn held_rotation_engages_when_cooldown_lapses() {
        let (world, mut state, nonce) = playable();
        let mut pow = ProofOfWork::new(nonce);

        advance(&mut state, &mut pow, &world, Accel::Idle, Rotation::Cw, 1);
        assert_eq!(state.last_rotate, 1);
        assert_eq!(state.rotation, Rotation::Cw);

        // Request the opposite turn while still cooling down: it must be
        // held and engage on the exact frame the cooldown lapses, never
        // earlier.
        let _ = advance(
            &mut state,
            &mut pow,
            &world,
            Accel::Idle,
            Rotation::Ccw,
            ROTATION_COOLDOWN + 50,
        );
        if state.frame >= 1 + ROTATION_COOLDOWN {
            assert_eq!(state.last_rotate, 1 + ROTATION_COOLDOWN);
            assert_eq!(state.rotation, Rotation::Ccw);
        } else {
            // Died before the window lapsed; nothing may have engaged.
            assert_eq!(state.last_rotate, 1);
        }
    }

    #[test]
    fn advance_matches_replay_bit_for_bit() {
        let (world, start, nonce) = playable();

        // Drive interactively with a varied input script.
        let mut live = start.clone();
        let mut pow = ProofOfWork::new(nonce);
        let script: [(Accel, Rotation, i32); 4] = [
            (Accel::GasRight, Rotation::None, 120),
            (Accel::GasRight, Rotation::Ccw, 250),
            (Accel::Brake, Rotation::None, 80),
            (Accel::GasLeft, Rotation::Cw, 150),
        ];
        for (accel, rotation, frames) in script {
            if advance(&mut live, &mut pow, &world, accel, rotation, frames)
                != StepResult::Continue
            {
                break;
            }
        }
        assert_eq!(pow.num_frames, live.frame);

        // A fresh replay of the recording must reproduce the live state,
        // whether the run survived or died on the way.
        let mut replayed = start;
        let _ = replay_trim(&mut replayed, &mut pow.clone(), &world, MAX_FRAMES);
        let mut cursor = BikeState::initial();
        let outcome = replay_trim(&mut cursor, &mut pow.clone(), &world, MAX_FRAMES);
        assert!(outcome.is_err(), "script is not a finishing run");
        assert_eq!(replayed.frame, live.frame);
        assert_eq!(replayed.bike, live.bike);
        assert_eq!(replayed.wheels, live.wheels);
        assert_eq!(replayed.head, live.head);
        assert_eq!(replayed.dead, live.dead);
    }

    #[test]
    fn rewind_by_cut_matches_fresh_run() {
        let (world, start, nonce) = playable();

        let mut long = start.clone();
        let mut pow = ProofOfWork::new(nonce);
        advance(&mut long, &mut pow, &world, Accel::GasRight, Rotation::None, 150);
        advance(&mut long, &mut pow, &world, Accel::Brake, Rotation::None, 150);

        // Rewind the recording to frame 150 and replay it.
        let mut cut_pow = pow.clone();
        cut_pow.cut(150);
        let mut rewound = start.clone();
        // The cut prefix has no finish, so the replay ends incomplete (or
        // crashed) after stepping exactly the rewound frames.
        let _ = replay(&mut rewound, &cut_pow, &world, MAX_FRAMES);

        // Compare against driving the same prefix directly.
        let mut direct = start;
        let mut direct_pow = ProofOfWork::new(nonce);
        advance(
            &mut direct,
            &mut direct_pow,
            &world,
            Accel::GasRight,
            Rotation::None,
            150,
        );
        if !direct.dead && !rewound.dead {
            assert_eq!(rewound.frame, direct.frame);
            assert_eq!(rewound.bike, direct.bike);
            assert_eq!(rewound.wheels, direct.wheels);
        }
    }

    #[test]
    fn check_bounds_the_stream() {
        let work = Work {
            block: [0x17; WORK_SIZE],
            target_frames: 1_000,
            msg: String::new(),
            is_new: true,
        };
        let mut pow = ProofOfWork::new(0);
        pow.num_frames = 1_000;
        assert!(!check(&work, &pow), "frame claim must beat the target");

        pow.num_frames = 500;
        pow.updates = vec![0; MAX_UPDATES + 1];
        assert!(!check(&work, &pow), "oversized stream must be rejected");
    }
}
