//! Greedy hill-climb search over control timelines.
//!
//! The solver keeps the best timeline found so far and repeatedly
//! replays jittered copies of it, shrinking the jitter as a temperature
//! counter runs down. Crossing a proximity threshold reheats the search
//! and multiplies the attempts per iteration, concentrating effort once
//! a candidate gets close to the finish.

use log::{debug, trace};
use rand::Rng;
use rand_chacha::ChaCha20Rng;

use crate::constants::{
    BASE_ATTEMPTS, MAX_FRAMES, NEAR_THRESHOLDS, OUTER_BUDGET, POOL_ROTATIONS, POOL_TOGGLES,
    REHEAT_TEMP, START_TEMP,
};
use crate::control::{compile_commands, Command, CommandKind};
use crate::pow::ProofOfWork;
use crate::replay::replay_trim;
use crate::state::{BikeState, Rotation};
use crate::world::World;

/// Outcome of one outer solver iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveStep {
    /// A replayed candidate reached the finish; the proof is trimmed and
    /// ready for the consensus check.
    Solved(ProofOfWork),
    Running,
    /// Temperature or the iteration budget ran out on this world.
    Exhausted,
}

/// Search state for one world. Deterministic for a fixed seed.
pub struct Solver {
    commands: Vec<Command>,
    best: Vec<Command>,
    best_dist: i64,
    thresholds_crossed: usize,
    temp: i32,
    iterations: u32,
    frame_budget: i32,
    rng: ChaCha20Rng,
    pow: ProofOfWork,
}

impl Solver {
    /// Seed a search with a random pool of rotations in both directions
    /// plus a few gas toggles, spread over the frame budget.
    pub fn new(nonce: u32, frame_budget: i32, mut rng: ChaCha20Rng) -> Self {
        let mut commands = Vec::with_capacity(2 * POOL_ROTATIONS + POOL_TOGGLES);
        for _ in 0..POOL_ROTATIONS {
            commands.push(Command {
                time: rng.gen_range(0..frame_budget),
                kind: CommandKind::Rotate(Rotation::Ccw),
            });
        }
        for _ in 0..POOL_ROTATIONS {
            commands.push(Command {
                time: rng.gen_range(0..frame_budget),
                kind: CommandKind::Rotate(Rotation::Cw),
            });
        }
        for _ in 0..POOL_TOGGLES {
            commands.push(Command {
                time: rng.gen_range(0..frame_budget),
                kind: CommandKind::Toggle,
            });
        }
        commands.sort_by_key(|c| c.time);

        Self {
            best: commands.clone(),
            commands,
            best_dist: 1 << 61,
            thresholds_crossed: 0,
            temp: START_TEMP,
            iterations: 0,
            frame_budget,
            rng,
            pow: ProofOfWork::new(nonce),
        }
    }

    #[must_use]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    #[must_use]
    pub fn best_distance_sq(&self) -> i64 {
        self.best_dist
    }

    /// Run one outer iteration: several jitter-and-replay attempts at the
    /// current temperature.
    pub fn step(&mut self, world: &World, first: &BikeState) -> SolveStep {
        self.temp -= 1;
        self.iterations += 1;
        if self.temp <= 0 || self.iterations > OUTER_BUDGET {
            debug!(
                "search exhausted after {} iterations, best distance {}",
                self.iterations, self.best_dist
            );
            return SolveStep::Exhausted;
        }

        let mut attempts = BASE_ATTEMPTS;
        if self.best_dist < NEAR_THRESHOLDS[0] {
            attempts *= 2;
        }
        if self.best_dist < NEAR_THRESHOLDS[1] {
            attempts *= 2;
        }

        for _ in 0..attempts {
            compile_commands(&self.commands, &mut self.pow, self.frame_budget);
            let mut state = first.clone();
            if replay_trim(&mut state, &mut self.pow, world, MAX_FRAMES).is_ok() {
                debug!(
                    "solved in {} frames after {} iterations",
                    self.pow.num_frames, self.iterations
                );
                return SolveStep::Solved(self.pow.clone());
            }

            if state.finish_dist_sq < self.best_dist {
                self.best_dist = state.finish_dist_sq;
                self.best = self.commands.clone();
                self.reheat_on_thresholds();
                trace!(
                    "better candidate: distance {} at temp {}",
                    self.best_dist, self.temp
                );
            }
            self.jitter();
        }
        SolveStep::Running
    }

    /// Each proximity threshold crossed for the first time adds heat,
    /// extending the search while it is converging.
    fn reheat_on_thresholds(&mut self) {
        while self.thresholds_crossed < NEAR_THRESHOLDS.len()
            && self.best_dist < NEAR_THRESHOLDS[self.thresholds_crossed]
        {
            self.thresholds_crossed += 1;
            self.temp += REHEAT_TEMP;
        }
    }

    /// Rebuild the working timeline from the best one, shifting command
    /// times from a random suffix by up to four temperatures either way.
    /// Biasing the jitter toward the tail keeps the converged opening of
    /// a good run intact.
    fn jitter(&mut self) {
        self.commands.clone_from(&self.best);
        let cnt = self.commands.len();
        let start = self
            .rng
            .gen_range(0..cnt + cnt / 3)
            .saturating_sub(cnt / 3)
            .min(cnt - 1);
        let spread = 8 * self.temp - 7;
        for cmd in &mut self.commands[start..] {
            let shift = self.rng.gen_range(0..spread) - 4 * self.temp;
            cmd.time = (cmd.time + shift).clamp(0, self.frame_budget);
        }
        self.commands.sort_by_key(|c| c.time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn seeded(seed: u64) -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(seed)
    }

    #[test]
    fn pool_is_seed_deterministic() {
        let a = Solver::new(5, 7_500, seeded(42));
        let b = Solver::new(5, 7_500, seeded(42));
        assert_eq!(a.commands, b.commands);
        let c = Solver::new(5, 7_500, seeded(43));
        assert_ne!(a.commands, c.commands);
    }

    #[test]
    fn pool_shape_and_bounds() {
        let s = Solver::new(0, 7_500, seeded(1));
        assert_eq!(s.commands.len(), 2 * POOL_ROTATIONS + POOL_TOGGLES);
        let toggles = s
            .commands
            .iter()
            .filter(|c| c.kind == CommandKind::Toggle)
            .count();
        assert_eq!(toggles, POOL_TOGGLES);
        assert!(s.commands.iter().all(|c| (0..7_500).contains(&c.time)));
        assert!(s.commands.windows(2).all(|w| w[0].time <= w[1].time));
    }

    #[test]
    fn jitter_keeps_times_sorted_and_clamped() {
        let mut s = Solver::new(0, 7_500, seeded(9));
        for _ in 0..50 {
            s.jitter();
            assert!(s.commands.iter().all(|c| (0..=7_500).contains(&c.time)));
            assert!(s.commands.windows(2).all(|w| w[0].time <= w[1].time));
            assert_eq!(s.commands.len(), s.best.len());
        }
    }

    #[test]
    fn temperature_runs_out() {
        let mut s = Solver::new(0, 7_500, seeded(3));
        s.temp = 1;
        let world = World::generate(&[0u8; crate::constants::WORK_SIZE], 0);
        let first = BikeState::initial();
        assert_eq!(s.step(&world, &first), SolveStep::Exhausted);
    }
}
