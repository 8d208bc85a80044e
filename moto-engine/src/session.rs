//! One mining session: a job, a playable world for it and a search.

use log::info;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::constants::{SOLVER_FRAME_BUDGET, WORLD_ATTEMPT_BUDGET};
use crate::pow::{ProofOfWork, Work};
use crate::solver::{SolveStep, Solver};
use crate::state::BikeState;
use crate::world::{World, WorldGenError};

/// How a mining session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MineOutcome {
    Solved(ProofOfWork),
    /// The search ran out on this world; try another session.
    Exhausted,
    /// The caller asked to stop, usually because new work arrived.
    Aborted,
}

/// A world picked for a job plus the search driving a bike across it.
pub struct Session {
    work: Work,
    world: World,
    first: BikeState,
    solver: Solver,
}

impl Session {
    /// Pick a playable world for the job (starting from a random nonce)
    /// and seed a search on it. The solver plans against the tighter of
    /// the job's frame target and its own planning horizon.
    pub fn create(work: Work, rng: &mut ChaCha20Rng) -> Result<Self, WorldGenError> {
        let (world, first, nonce) =
            World::generate_playable(&work.block, rng.next_u32(), WORLD_ATTEMPT_BUDGET)?;
        info!(
            "session on nonce {nonce}, line score {}",
            world.line_clearance_score()
        );
        let frame_budget = work.target_frames.min(SOLVER_FRAME_BUDGET);
        let solver = Solver::new(nonce, frame_budget, ChaCha20Rng::seed_from_u64(rng.next_u64()));
        Ok(Self {
            work,
            world,
            first,
            solver,
        })
    }

    #[must_use]
    pub fn work(&self) -> &Work {
        &self.work
    }

    /// Drive the search until it solves, exhausts, or `should_abort`
    /// reports pending outside input. The abort poll happens between
    /// outer iterations, so it is cheap to call often.
    pub fn mine(&mut self, mut should_abort: impl FnMut() -> bool) -> MineOutcome {
        loop {
            if should_abort() {
                return MineOutcome::Aborted;
            }
            match self.solver.step(&self.world, &self.first) {
                SolveStep::Solved(pow) => return MineOutcome::Solved(pow),
                SolveStep::Running => {}
                SolveStep::Exhausted => return MineOutcome::Exhausted,
            }
        }
    }
}
