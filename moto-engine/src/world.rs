//! Deterministic terrain generation and sampling.
//!
//! A world is a 64x64 grid of signed byte gradient vectors filled
//! directly from consecutive SHA-512 digests of the block payload and a
//! nonce. The digests double as the raw terrain data; there is nothing
//! to invert. Bilinear smoothstep interpolation of the gradients defines
//! an implicit potential; points whose potential exceeds
//! [`GROUND_LEVEL`](crate::constants::GROUND_LEVEL) are inside the ground.

use log::debug;
use sha2::{Digest, Sha512};
use thiserror::Error;

use crate::constants::{
    FINISH, GROUND_LEVEL, MAP_SIZE, START, WHEEL_RADIUS_65536, WORK_SIZE,
};
use crate::numeric::{inv_grad_len, mul_q16, mul_u16, smooth, smooth_slope_half};
use crate::physics::step;
use crate::state::{Accel, BikeState, Rotation, StepResult};

const DIGEST_LEN: usize = 64;
const MAP_BYTES: usize = 2 * MAP_SIZE * MAP_SIZE;
const LINE_PROBE_SAMPLES: i32 = 18;
const LINE_PROBE_LEVEL: i32 = GROUND_LEVEL / 4;
// Long enough for the spawn drop to land and the suspension to settle.
const SETTLE_PROBE_FRAMES: i32 = 500;

/// World generation gave up before finding a playable terrain.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("no playable world within {attempts} nonce attempts")]
pub struct WorldGenError {
    pub attempts: u32,
}

/// Immutable terrain grid. Same `(block, nonce)` input always produces a
/// byte-identical grid; both axes are periodic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct World {
    cells: [[[i8; 2]; MAP_SIZE]; MAP_SIZE],
}

impl World {
    /// Fill the grid from consecutive SHA-512 digests of
    /// `{segment byte, nonce LE, block payload}`, then force the border
    /// row to a constant downward gradient so the bottom of the map is
    /// always solid ground.
    #[must_use]
    pub fn generate(block: &[u8; WORK_SIZE], nonce: u32) -> Self {
        let mut msg = [0u8; 1 + 4 + WORK_SIZE];
        msg[1..5].copy_from_slice(&nonce.to_le_bytes());
        msg[5..].copy_from_slice(block);

        let mut bytes = [0u8; MAP_BYTES];
        for (seg, chunk) in bytes.chunks_exact_mut(DIGEST_LEN).enumerate() {
            msg[0] = seg as u8;
            chunk.copy_from_slice(&Sha512::digest(msg));
        }

        let mut cells = [[[0i8; 2]; MAP_SIZE]; MAP_SIZE];
        for (b, byte) in bytes.iter().enumerate() {
            cells[b / (2 * MAP_SIZE)][(b / 2) % MAP_SIZE][b % 2] = *byte as i8;
        }
        for column in &mut cells {
            column[0] = [0, -127];
        }
        Self { cells }
    }

    /// Generate worlds for consecutive nonces until one passes the
    /// playability probes, returning the world, its initial state and
    /// the nonce that produced it. Ill-formed worlds are skipped
    /// silently; only an exhausted attempt budget is an error.
    pub fn generate_playable(
        block: &[u8; WORK_SIZE],
        start_nonce: u32,
        attempt_budget: u32,
    ) -> Result<(Self, BikeState, u32), WorldGenError> {
        let mut nonce = start_nonce;
        for attempt in 0..attempt_budget {
            let world = Self::generate(block, nonce);
            let first = BikeState::initial();
            if world.is_playable(&first) {
                debug!("playable world at nonce {nonce} after {attempt} rejections");
                return Ok((world, first, nonce));
            }
            nonce = nonce.wrapping_add(1);
        }
        Err(WorldGenError {
            attempts: attempt_budget,
        })
    }

    /// Interpolated potential and gradient at a position. Gradient
    /// components are forced odd so a zero gradient can never reach the
    /// collision normalization.
    #[must_use]
    pub fn sample(&self, p: [i32; 2]) -> (i32, [i32; 2]) {
        let x64 = u64::from(p[0] as u32) * MAP_SIZE as u64;
        let y64 = u64::from(p[1] as u32) * MAP_SIZE as u64;
        let i0 = (x64 >> 32) as usize;
        let i1 = (i0 + 1) % MAP_SIZE;
        let j0 = (y64 >> 32) as usize;
        let j1 = (j0 + 1) % MAP_SIZE;

        // Fractional cell position, Q22.
        let x = ((x64 & 0xFFFF_FFFF) >> 10) as i32;
        let y = ((y64 & 0xFFFF_FFFF) >> 10) as i32;
        let sx = smooth((x >> 6) as u32);
        let sy = smooth((y >> 6) as u32);
        let sxsy = mul_u16(sx, sy);
        let dsx_half = smooth_slope_half((x >> 6) as u32);
        let dsy_half = smooth_slope_half((y >> 6) as u32);

        let [x00, y00] = self.grad_at(i0, j0);
        let [x01, y01] = self.grad_at(i0, j1);
        let [x10, y10] = self.grad_at(i1, j0);
        let [x11, y11] = self.grad_at(i1, j1);

        // Corner potentials: each corner's gradient dotted with the
        // offset from that corner.
        let q00 = (x00 * x + y00 * y) >> 16;
        let q01 = (x01 * x + y01 * (y - 4_194_304)) >> 16;
        let q11 = (x11 * (x - 4_194_304) + y11 * (y - 4_194_304)) >> 16;
        let q10 = (x10 * (x - 4_194_304) + y10 * y) >> 16;
        let q1 = q10 - q00;
        let q2 = q01 - q00;
        let q3 = q00 - q01 - q10 + q11;
        let q4 = q2 + mul_q16(q3, sx);
        let q5 = q1 + mul_q16(q3, sy);
        let f = q00 + mul_q16(q1, sx) + mul_q16(q4, sy);

        let mut gx = ((x00
            + mul_q16(x10 - x00, sx)
            + mul_q16(x01 - x00, sy)
            + mul_q16(x00 - x01 - x10 + x11, sxsy))
            << 5)
            + mul_q16(q5, dsx_half);
        let mut gy = ((y00
            + mul_q16(y10 - y00, sx)
            + mul_q16(y01 - y00, sy)
            + mul_q16(y00 - y01 - y10 + y11, sxsy))
            << 5)
            + mul_q16(q4, dsy_half);
        gx |= 1;
        gy |= 1;

        (f, [gx, gy])
    }

    /// Potential only; cheaper probe used by world scoring.
    #[must_use]
    pub fn potential(&self, p: [i32; 2]) -> i32 {
        self.sample(p).0
    }

    /// Distance from a point to the ground surface on the 65536 scale,
    /// zero if the point is already inside the ground.
    ///
    /// The sampled potential moves by `128 * |grad|` per world unit, so
    /// the first-order distance is `(GROUND_LEVEL - f) * 512 / |grad|`
    /// on this scale; `inv` carries `2^30 / |grad|`, hence the shift.
    #[must_use]
    pub fn ground_clearance(&self, p: [i32; 2]) -> i32 {
        let (f, grad) = self.sample(p);
        if f > GROUND_LEVEL {
            return 0;
        }
        let inv = inv_grad_len(grad);
        ((i64::from(GROUND_LEVEL - f) * i64::from(inv)) >> 21) as i32
    }

    /// Playability probes required before a world may be mined: the
    /// finish must clear a wheel radius, and the bike must survive its
    /// spawn drop and settle through a run of idle frames. Worlds whose
    /// landing is fatal waste the whole search budget, so they are
    /// screened out here.
    #[must_use]
    pub fn is_playable(&self, first: &BikeState) -> bool {
        if self.ground_clearance(FINISH) <= WHEEL_RADIUS_65536 {
            return false;
        }
        let mut probe = first.clone();
        for _ in 0..SETTLE_PROBE_FRAMES {
            if step(&mut probe, self, Accel::Idle, Rotation::None) != StepResult::Continue {
                return false;
            }
        }
        true
    }

    /// Count how many samples on the straight start-finish line clear the
    /// open-air potential threshold. Optional quality score for picking
    /// among accepted worlds; the validator never consults it.
    #[must_use]
    pub fn line_clearance_score(&self) -> u32 {
        let mut score = 0;
        for i in 0..=LINE_PROBE_SAMPLES {
            let p = [
                FINISH[0] / LINE_PROBE_SAMPLES * (LINE_PROBE_SAMPLES - i)
                    + START[0] / LINE_PROBE_SAMPLES * i,
                FINISH[1] / LINE_PROBE_SAMPLES * (LINE_PROBE_SAMPLES - i)
                    + START[1] / LINE_PROBE_SAMPLES * i,
            ];
            if self.potential(p) < LINE_PROBE_LEVEL {
                score += 1;
            }
        }
        score
    }

    #[inline]
    fn grad_at(&self, i: usize, j: usize) -> [i32; 2] {
        let c = self.cells[i][j];
        [i32::from(c[0]), i32::from(c[1])]
    }

    /// Raw grid bytes in generation order, for determinism checks.
    #[must_use]
    pub fn raw_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MAP_BYTES);
        for column in &self.cells {
            for cell in column {
                out.push(cell[0] as u8);
                out.push(cell[1] as u8);
            }
        }
        out
    }
}
