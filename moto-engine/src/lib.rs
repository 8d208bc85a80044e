//! Moto Mining Engine
//!
//! Deterministic simulation core for the motorbike proof-of-work: terrain
//! generation, fixed-point physics, proof replay and the hill-climb
//! solver. Everything consensus-relevant lives here, free of I/O and
//! platform-specific dependencies.

pub mod constants;
pub mod control;
pub mod numeric;
pub mod physics;
pub mod pow;
pub mod protocol;
pub mod replay;
pub mod session;
pub mod solver;
pub mod state;
pub mod world;

// Re-export commonly used types
pub use control::{Command, CommandKind, compile_commands, rotation_ready};
pub use physics::{finish_distance_sq, step};
pub use pow::{ProofOfWork, UpdateCode, Work};
pub use protocol::{parse_solution, parse_work, solution_line, work_line};
pub use replay::{ReplayError, advance, check, replay, replay_trim};
pub use session::{MineOutcome, Session};
pub use solver::{SolveStep, Solver};
pub use state::{Accel, BikeState, Body, Rotation, StepResult};
pub use world::{World, WorldGenError};
