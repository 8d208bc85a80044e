//! Shared consensus constants for the motorbike proof-of-work.
//!
//! Every value here is part of the acceptance rule: two validators only
//! agree on a proof if they agree on every constant in this module, so
//! none of them is a per-deployment tunable. Changing any one of them
//! invalidates all previously mined proofs.
//!
//! Unit conventions:
//! - The world is a unit square, periodic in both axes; positions are
//!   `i32` ticks with 2^32 ticks per world width. One grid cell is 1/64
//!   of the world, read as one metre.
//! - Velocities are ticks per frame at 250 frames per second.
//! - Angles are `i32` with 2^32 per full turn; angular velocities are
//!   angle ticks per frame.
//! - Terrain potential is scaled so that 8192 reads as 1.0; the sampled
//!   gradient moves the potential by `128 * |grad|` per world unit, so
//!   ground distances convert as `delta_f * 512 / |grad|` on the 65536
//!   clearance scale.
//! - Force and torque accumulators are `i64`; dividing by a body's
//!   `*_MASS_DIV_DT` constant yields its per-frame velocity change.

/// Bytes of block payload hashed into each terrain segment.
pub const WORK_SIZE: usize = 48;

/// Side length of the terrain gradient grid.
pub const MAP_SIZE: usize = 64;

/// Simulated frame rate; one frame is 1/250 s.
pub const FRAME_RATE: i32 = 250;

/// Hard cap on frames in a single run; reaching it kills the bike.
pub const MAX_FRAMES: i32 = 25_000;

/// Capacity of the update-code stream in a proof.
pub const MAX_UPDATES: usize = 1_500;

/// Largest frame delta one 16-bit update code can carry
/// (`delta * 12 + rotation * 4 + accel` must fit in a `u16`).
pub const MAX_FRAME_DELTA: u16 = 5_460;

/// Minimum frame separation between two accepted rotation commands.
pub const ROTATION_COOLDOWN: i32 = 200;

/// Terrain potential above which a point is inside the ground.
pub const GROUND_LEVEL: i32 = 2_000;

/// Domain clamp for the quantized inverse-gradient-length helper.
pub const INV_SQRT_CLAMP: i64 = 150_000;

// Bike geometry (position ticks) -------------------------------------------

/// Distance between the two wheel centres (1.0 m).
pub const WHEEL_BASE: i32 = 67_108_864;
/// Horizontal offset from the bike centre to each wheel (0.5 m).
pub const BIKE_OFFSET_X: i32 = 33_554_432;
/// Vertical offset from the wheel axle line up to the bike centre (0.3 m).
pub const BIKE_OFFSET_Y: i32 = 20_132_659;
/// Offset from the bike centre up to the rider's head (0.6 m).
pub const HEAD_OFFSET: i32 = 40_265_318;

/// Wheel radius in position ticks (0.3 m).
pub const WHEEL_RADIUS_TICKS: i32 = 20_132_659;
/// Wheel radius on the ground-clearance scale (world units * 65536).
pub const WHEEL_RADIUS_65536: i32 = 307;
/// Head radius on the ground-clearance scale (0.2 m).
pub const HEAD_RADIUS_65536: i32 = 205;

/// Start point: left wheel centre at (0.05, 0.05) of the world.
pub const START: [i32; 2] = [214_748_365, 214_748_365];
/// Finish point at (0.495, 0.05) of the world. Kept in the positive
/// `i32` half so the wraparound distance metric stays well formed.
pub const FINISH: [i32; 2] = [2_125_998_740, 214_748_365];

/// Capture radius around the finish for either wheel (two wheel radii).
pub const FINISH_CAPTURE_WHEEL: i32 = 40_265_318;
/// Capture radius around the finish for the head (wheel + head radius).
pub const FINISH_CAPTURE_HEAD: i32 = 33_554_432;

// Masses, expressed as force-accumulator divisors ---------------------------

pub const WHEEL_MASS_DIV_DT: i64 = 65_536;
pub const BIKE_MASS_DIV_DT: i64 = 262_144;
pub const HEAD_MASS_DIV_DT: i64 = 131_072;
pub const WHEEL_ANG_MASS_DIV_DT: i64 = 65_536;
pub const BIKE_ANG_MASS_DIV_DT: i64 = 65_536;

/// Divisor turning a force accumulator into a per-frame velocity scale,
/// used when comparing contact forces against velocities.
pub const FORCE_TO_VEL: i64 = 65_536;

// Gravity, pre-multiplied per body (negative y is down) ---------------------

pub const GRAVITY_WHEEL: i64 = -690_225_152;
pub const GRAVITY_BIKE: i64 = -2_760_900_608;
pub const GRAVITY_HEAD: i64 = -1_380_450_304;

// Suspension ----------------------------------------------------------------

/// Bike/wheel spring stiffness (force per tick of displacement).
pub const WHEEL_SPRING_K: i64 = 1_600;
/// Bike/wheel damper gain (force per tick-per-frame of relative speed).
pub const WHEEL_DAMP_K: i64 = 10_240;
/// Squared head displacement past which the neck stiffens hard,
/// modelling the rider starting to detach (~0.25 m).
pub const HEAD_DISPLACEMENT_SQ: i64 = 1 << 48;
/// Divisor mapping spring cross products onto bike torque.
pub const BIKE_TORQUE_DIV: i64 = 512;
/// Divisor mapping damper cross products onto bike torque.
pub const BIKE_TORQUE_DAMP_DIV: i64 = 64;

// Rotation ------------------------------------------------------------------

/// Position ticks per radian of bike angle (2^32 / 2*pi).
pub const INV_ANG_POS_K: i64 = 683_565_276;
/// Angular impulse applied on the first frame of a rotation.
pub const ROTATION_KICK: i64 = 687_194_767_360;
/// Gain of the proportional counter-torque applied a quarter of the
/// cooldown after a rotation started.
pub const ROTATION_BRAKE_GAIN: i64 = 1_024;
/// Scale from angular velocity to the clamped counter-torque input.
pub const INV_MAX_DELTA_ROT_V: i32 = 64;

// Wheel drive ---------------------------------------------------------------

/// Wheel spin clamp (angle ticks per frame, ~8.7 rev/s).
pub const MAX_WHEEL_SPIN: i32 = 150_000_000;
/// Drive torque while accelerating below the spin clamp.
pub const DRIVE_TORQUE: i64 = 26_214_400_000;
/// Brake friction gain, applied against each wheel's spin relative
/// to the bike body.
pub const BRAKE_FRICTION: i64 = 128;
/// Scale from relative spin to the clamped brake torque input.
pub const INV_MAX_BRAKE_DELTA_V: i32 = 16;

// Ground contact ------------------------------------------------------------

/// Normal approach speed below which contact is treated as resting.
pub const CONTACT_SPEED_EPS: i32 = 2_500;
/// Divisor from wheel spin to contact surface speed in ticks per frame.
pub const SURFACE_SPEED_DIV: i32 = 32;
/// Torque produced per tick-per-frame of clamped contact friction.
pub const FRICTION_TORQUE_K: i64 = 2_097_152;
/// Friction clamp multiplier on the contact normal load.
pub const FRICTION_GRIP: i32 = 10;

// Solver tuning (not consensus, but fixed for reproducible searches) --------

/// Temperature a fresh search pool starts from.
pub const START_TEMP: i32 = 300;
/// Temperature added when the best distance crosses a proximity threshold.
pub const REHEAT_TEMP: i32 = 100;
/// Inner replay attempts per outer iteration before intensification.
pub const BASE_ATTEMPTS: u32 = 7;
/// Squared-distance thresholds that intensify and reheat the search.
pub const NEAR_THRESHOLDS: [i64; 3] = [87_412_622, 28_088_677, 5_088_677];
/// Rotation commands of each direction in the search pool.
pub const POOL_ROTATIONS: usize = 15;
/// Accelerator toggle commands in the search pool.
pub const POOL_TOGGLES: usize = 5;
/// Outer iterations before a search is declared exhausted.
pub const OUTER_BUDGET: u32 = 10_000;
/// Frame budget the solver plans candidate timelines against (30 s).
pub const SOLVER_FRAME_BUDGET: i32 = 7_500;
/// Frame of the initial throttle-open event in every candidate (1.5 s).
pub const THROTTLE_OPEN_FRAME: i32 = 375;

/// Nonce attempts before world generation reports exhaustion.
pub const WORLD_ATTEMPT_BUDGET: u32 = 200_000;
