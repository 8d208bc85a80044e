//! Proofs of work and their 16-bit update-code stream.
//!
//! A proof is the nonce that selected the world plus a compressed input
//! recording: each code packs a frame delta together with the rotation
//! and accelerator inputs that take effect once that delta has elapsed,
//! as `delta * 12 + rotation * 4 + accel`.

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_FRAME_DELTA, MAX_UPDATES, WORK_SIZE};
use crate::state::{Accel, Rotation};

/// One mining job: the block payload the terrain is derived from and the
/// frame count a proof must beat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Work {
    pub block: [u8; WORK_SIZE],
    /// Proofs with `num_frames >= target_frames` are rejected.
    pub target_frames: i32,
    /// Free-form tag echoed back with the solution.
    pub msg: String,
    /// Set when this job replaces the previous one instead of extending it.
    pub is_new: bool,
}

/// Decoded view of one update code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateCode {
    pub frame_delta: u16,
    pub rotation: Rotation,
    pub accel: Accel,
}

impl UpdateCode {
    #[must_use]
    pub const fn encode(self) -> u16 {
        self.frame_delta * 12 + self.rotation.code() * 4 + self.accel.code()
    }

    /// Permissive decode: any `u16` yields a code. Validity (delta range,
    /// redundancy) is the replay's concern, not the decoder's.
    #[must_use]
    pub const fn decode(raw: u16) -> Self {
        Self {
            frame_delta: raw / 12,
            rotation: Rotation::from_code((raw % 12) / 4),
            accel: Accel::from_code(raw % 4),
        }
    }
}

/// A candidate or finished proof: world nonce, claimed frame count and
/// the update-code stream that must replay to a finish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOfWork {
    pub nonce: u32,
    pub num_frames: i32,
    pub updates: Vec<u16>,
}

impl ProofOfWork {
    #[must_use]
    pub fn new(nonce: u32) -> Self {
        Self {
            nonce,
            num_frames: 0,
            updates: Vec::new(),
        }
    }

    /// Accelerator carried by the last recorded code, or the initial
    /// idle state for an empty stream.
    #[must_use]
    pub fn last_accel(&self) -> Accel {
        match self.updates.last() {
            Some(&raw) => Accel::from_code(raw % 4),
            None => Accel::Idle,
        }
    }

    /// Frame at which the last recorded input takes effect.
    #[must_use]
    pub fn last_input_frame(&self) -> i32 {
        self.updates.iter().map(|&u| i32::from(u / 12)).sum()
    }

    /// Append an input change at `frame`. Inputs identical to the stream's
    /// current tail are suppressed; deltas too large for one code are
    /// bridged with maximal filler codes that repeat the current inputs.
    ///
    /// Returns false (recording nothing) when the stream is out of
    /// capacity for the change plus its fillers.
    pub fn record_update(&mut self, frame: i32, accel: Accel, rotation: Rotation) -> bool {
        let prev_accel = self.last_accel();
        if accel == prev_accel && rotation == Rotation::None {
            return true;
        }

        let mut delta = (frame - self.last_input_frame()).max(0);
        let fillers = delta / i32::from(MAX_FRAME_DELTA + 1);
        if self.updates.len() + fillers as usize + 1 > MAX_UPDATES {
            return false;
        }

        while delta > i32::from(MAX_FRAME_DELTA) {
            self.updates.push(
                UpdateCode {
                    frame_delta: MAX_FRAME_DELTA,
                    rotation: Rotation::None,
                    accel: prev_accel,
                }
                .encode(),
            );
            delta -= i32::from(MAX_FRAME_DELTA);
        }
        self.updates.push(
            UpdateCode {
                frame_delta: delta as u16,
                rotation,
                accel,
            }
            .encode(),
        );
        true
    }

    /// Truncate the proof to end at `to_frame`: drop every code that only
    /// takes effect on or after it and claim `to_frame` frames.
    pub fn cut(&mut self, to_frame: i32) {
        self.num_frames = to_frame;
        let mut elapsed = 0;
        for (i, &raw) in self.updates.iter().enumerate() {
            elapsed += i32::from(raw / 12);
            if elapsed >= to_frame {
                self.updates.truncate(i);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_packing_roundtrips() {
        for delta in [0u16, 1, 250, MAX_FRAME_DELTA] {
            for rotation in [Rotation::None, Rotation::Cw, Rotation::Ccw] {
                for accel in [Accel::Idle, Accel::GasLeft, Accel::GasRight, Accel::Brake] {
                    let code = UpdateCode {
                        frame_delta: delta,
                        rotation,
                        accel,
                    };
                    assert_eq!(UpdateCode::decode(code.encode()), code);
                }
            }
        }
    }

    #[test]
    fn redundant_updates_are_suppressed() {
        let mut pow = ProofOfWork::new(0);
        assert!(pow.record_update(10, Accel::Idle, Rotation::None));
        assert!(pow.updates.is_empty());
        assert!(pow.record_update(10, Accel::GasRight, Rotation::None));
        assert_eq!(pow.updates.len(), 1);
        assert!(pow.record_update(20, Accel::GasRight, Rotation::None));
        assert_eq!(pow.updates.len(), 1, "same accel, no rotation: suppressed");
    }

    #[test]
    fn long_gaps_get_filler_codes() {
        let mut pow = ProofOfWork::new(0);
        let gap = 2 * i32::from(MAX_FRAME_DELTA) + 100;
        assert!(pow.record_update(gap, Accel::Brake, Rotation::Cw));
        assert_eq!(pow.updates.len(), 3);
        for &raw in &pow.updates[..2] {
            let code = UpdateCode::decode(raw);
            assert_eq!(code.frame_delta, MAX_FRAME_DELTA);
            assert_eq!(code.rotation, Rotation::None);
            assert_eq!(code.accel, Accel::Idle, "filler repeats prior accel");
        }
        assert_eq!(pow.last_input_frame(), gap);
        assert_eq!(UpdateCode::decode(pow.updates[2]).frame_delta, 100);
    }

    #[test]
    fn capacity_refuses_cleanly() {
        let mut pow = ProofOfWork::new(0);
        let mut accel = Accel::GasLeft;
        for f in 0..MAX_UPDATES as i32 {
            assert!(pow.record_update(f, accel, Rotation::None));
            accel = accel.flipped();
        }
        assert_eq!(pow.updates.len(), MAX_UPDATES);
        let before = pow.updates.clone();
        assert!(!pow.record_update(MAX_UPDATES as i32, accel, Rotation::None));
        assert_eq!(pow.updates, before, "failed record must not mutate");
    }

    #[test]
    fn cut_drops_late_codes() {
        let mut pow = ProofOfWork::new(0);
        pow.record_update(100, Accel::GasRight, Rotation::None);
        pow.record_update(300, Accel::Brake, Rotation::None);
        pow.record_update(500, Accel::GasLeft, Rotation::None);
        pow.cut(300);
        assert_eq!(pow.num_frames, 300);
        assert_eq!(pow.updates.len(), 1);
        assert_eq!(pow.last_input_frame(), 100);
    }
}
