//! Fixed-point physics stepper.
//!
//! One call advances exactly one simulated frame of bike, wheel and head
//! dynamics. Every operation is wrapping integer arithmetic so that two
//! independent validators stepping the same inputs reach bit-identical
//! states; floating point never enters the loop.

use crate::constants::{
    BIKE_ANG_MASS_DIV_DT, BIKE_MASS_DIV_DT, BIKE_OFFSET_X, BIKE_OFFSET_Y, BIKE_TORQUE_DAMP_DIV,
    BIKE_TORQUE_DIV, BRAKE_FRICTION, CONTACT_SPEED_EPS, DRIVE_TORQUE, FINISH,
    FINISH_CAPTURE_HEAD, FINISH_CAPTURE_WHEEL, FORCE_TO_VEL, FRICTION_GRIP, FRICTION_TORQUE_K,
    GRAVITY_BIKE, GRAVITY_HEAD, GRAVITY_WHEEL, GROUND_LEVEL, HEAD_DISPLACEMENT_SQ, HEAD_OFFSET,
    HEAD_MASS_DIV_DT, HEAD_RADIUS_65536, INV_ANG_POS_K, INV_MAX_BRAKE_DELTA_V,
    INV_MAX_DELTA_ROT_V, MAX_FRAMES, MAX_WHEEL_SPIN, ROTATION_BRAKE_GAIN, ROTATION_COOLDOWN,
    ROTATION_KICK, SURFACE_SPEED_DIV, WHEEL_ANG_MASS_DIV_DT, WHEEL_DAMP_K, WHEEL_MASS_DIV_DT,
    WHEEL_RADIUS_65536, WHEEL_SPRING_K,
};
use crate::numeric::{cos16, inv_grad_len, q31_mul, sign, sin16};
use crate::state::{Accel, BikeState, Body, Rotation, StepResult};
use crate::world::World;

/// Wraparound-aware squared distance to the finish. The horizontal axis
/// is periodic and de-weighted by 8 so vertical error dominates the
/// solver's feedback.
#[must_use]
pub fn finish_distance_sq(p: [i32; 2], finish: [i32; 2]) -> i64 {
    let d: i64 = 1 << 32;
    let mut py = i64::from(p[1]);
    if py < 0 {
        py += d;
    }
    let dx = i64::from(finish[0]) - i64::from(p[0]);
    let dy = py - i64::from(finish[1]);
    let straight = ((dx / 8 * dx) >> 32) + ((dy / 8 * dy) >> 32);
    let wrapped = (((dx - d) / 8 * (dx - d)) >> 32) + ((dy / 8 * dy) >> 32);
    straight.min(wrapped)
}

fn is_dist_less(a: [i32; 2], b: [i32; 2], dist: i32) -> bool {
    let dx = i64::from(a[0].wrapping_sub(b[0]));
    let dy = i64::from(a[1].wrapping_sub(b[1]));
    ((dx * dx) >> 32) + ((dy * dy) >> 32) < (i64::from(dist) * i64::from(dist)) >> 32
}

/// Spring/damper coupling between the bike body and one wheel. `bn` is
/// the wheel's intended offset in the bike frame; the reaction force and
/// the torque from both spring and damper go back into the bike.
fn couple_bike_wheel(
    bike: &Body,
    wheel: &Body,
    bn: [i32; 2],
    wheel_f: &mut [i64; 2],
    bike_f: &mut [i64; 2],
    bike_m: &mut i64,
) {
    let bw = [
        wheel.pos[0].wrapping_sub(bike.pos[0]),
        wheel.pos[1].wrapping_sub(bike.pos[1]),
    ];
    let wn = [bn[0].wrapping_sub(bw[0]), bn[1].wrapping_sub(bw[1])];
    let v = [
        (-(i64::from(bw[1]) * i64::from(bike.ang_vel) / INV_ANG_POS_K) as i32)
            .wrapping_add(bike.vel[0])
            .wrapping_sub(wheel.vel[0]),
        ((i64::from(bw[0]) * i64::from(bike.ang_vel) / INV_ANG_POS_K) as i32)
            .wrapping_add(bike.vel[1])
            .wrapping_sub(wheel.vel[1]),
    ];
    let fx = i64::from(wn[0]) * WHEEL_SPRING_K + i64::from(v[0]) * WHEEL_DAMP_K;
    let fy = i64::from(wn[1]) * WHEEL_SPRING_K + i64::from(v[1]) * WHEEL_DAMP_K;
    wheel_f[0] += fx;
    wheel_f[1] += fy;
    bike_f[0] -= fx;
    bike_f[1] -= fy;
    *bike_m -= (i64::from(bn[0]) * i64::from(wn[1]) - i64::from(bn[1]) * i64::from(wn[0]))
        / BIKE_TORQUE_DIV
        + (-i64::from(v[0]) * i64::from(bw[1]) + i64::from(v[1]) * i64::from(bw[0]))
            / BIKE_TORQUE_DAMP_DIV;
}

/// Spring/damper pulling the head toward its seat above the bike. The
/// neck is soft until the head drifts past the detachment threshold,
/// then stiffens hard.
fn couple_bike_head(bike: &Body, head: &Body, hn_seat: [i32; 2], head_f: &mut [i64; 2]) {
    let bh = [
        head.pos[0].wrapping_sub(bike.pos[0]),
        head.pos[1].wrapping_sub(bike.pos[1]),
    ];
    let hn = [hn_seat[0].wrapping_sub(bh[0]), hn_seat[1].wrapping_sub(bh[1])];

    let displaced = i64::from(hn[0]) * i64::from(hn[0]) + i64::from(hn[1]) * i64::from(hn[1])
        >= HEAD_DISPLACEMENT_SQ;
    let k = if displaced {
        2 * WHEEL_SPRING_K
    } else {
        WHEEL_SPRING_K / 5
    };

    let v = [
        (-(i64::from(bh[1]) * i64::from(bike.ang_vel) / INV_ANG_POS_K) as i32)
            .wrapping_add(bike.vel[0])
            .wrapping_sub(head.vel[0]),
        ((i64::from(bh[0]) * i64::from(bike.ang_vel) / INV_ANG_POS_K) as i32)
            .wrapping_add(bike.vel[1])
            .wrapping_sub(head.vel[1]),
    ];
    head_f[0] += i64::from(hn[0]) * k + i64::from(v[0]) * (WHEEL_DAMP_K / 5);
    head_f[1] += i64::from(hn[1]) * k + i64::from(v[1]) * (WHEEL_DAMP_K / 5);
}

/// Wheel/ground interaction plus integration of the wheel's state.
/// Returns false when the wheel is embedded beyond recovery.
fn advance_wheel(wheel: &mut Body, mut f: [i64; 2], mut torque: i64, world: &World) -> bool {
    let (pot, grad) = world.sample(wheel.pos);
    if pot > GROUND_LEVEL {
        return false;
    }

    let inv = inv_grad_len(grad);
    // Same scale as World::ground_clearance: 65536 units per world unit.
    let clearance = ((i64::from(GROUND_LEVEL - pot) * i64::from(inv)) >> 21) as i32;
    if clearance < WHEEL_RADIUS_65536 {
        // Unit surface normal, Q30 (hence the *2 after each Q31 multiply).
        let n = [
            (i64::from(grad[0]) * i64::from(inv)).clamp(i64::from(i32::MIN), i64::from(i32::MAX))
                as i32,
            (i64::from(grad[1]) * i64::from(inv)).clamp(i64::from(i32::MIN), i64::from(i32::MAX))
                as i32,
        ];
        let push = (WHEEL_RADIUS_65536 - clearance) * 65_536;
        wheel.pos[0] = wheel.pos[0].wrapping_sub(q31_mul(n[0], push).wrapping_mul(2));
        wheel.pos[1] = wheel.pos[1].wrapping_sub(q31_mul(n[1], push).wrapping_mul(2));

        let approach = (-q31_mul(n[0], wheel.vel[0]))
            .wrapping_mul(2)
            .wrapping_sub(q31_mul(n[1], wheel.vel[1]).wrapping_mul(2));
        if approach < -CONTACT_SPEED_EPS {
            wheel.vel[0] = wheel.vel[0].wrapping_add(q31_mul(approach, n[0]).wrapping_mul(2));
            wheel.vel[1] = wheel.vel[1].wrapping_add(q31_mul(approach, n[1]).wrapping_mul(2));
            let load = q31_mul(n[0], (f[0] / FORCE_TO_VEL) as i32)
                .wrapping_mul(2)
                .wrapping_add(q31_mul(n[1], (f[1] / FORCE_TO_VEL) as i32).wrapping_mul(2));
            if load > 0 {
                // Slip between the contact patch and the spinning wheel.
                let slip = q31_mul(wheel.vel[0], n[1])
                    .wrapping_mul(2)
                    .wrapping_sub(q31_mul(wheel.vel[1], n[0]).wrapping_mul(2))
                    .wrapping_sub(wheel.ang_vel / SURFACE_SPEED_DIV);
                let k = sign(slip)
                    * i64::min(i64::from(FRICTION_GRIP) * i64::from(load), i64::from(slip.abs()))
                        as i32;
                torque += i64::from(k) * FRICTION_TORQUE_K;
                f[0] -= i64::from(q31_mul(n[1], k)) * FORCE_TO_VEL * 2;
                f[1] += i64::from(q31_mul(n[0], k)) * FORCE_TO_VEL * 2;
            }
        }
    }

    wheel.ang_pos = wheel.ang_pos.wrapping_add(wheel.ang_vel);
    wheel.ang_vel = wheel.ang_vel.wrapping_add((torque / WHEEL_ANG_MASS_DIV_DT) as i32);
    wheel.pos[0] = wheel.pos[0].wrapping_add(wheel.vel[0]);
    wheel.pos[1] = wheel.pos[1].wrapping_add(wheel.vel[1]);
    wheel.vel[0] = wheel.vel[0].wrapping_add((f[0] / WHEEL_MASS_DIV_DT) as i32);
    wheel.vel[1] = wheel.vel[1].wrapping_add((f[1] / WHEEL_MASS_DIV_DT) as i32);
    true
}

/// Advance one frame. Mutates `state`; once dead, every further call is
/// a failure with no further mutation.
pub fn step(
    state: &mut BikeState,
    world: &World,
    accel: Accel,
    rotation: Rotation,
) -> StepResult {
    if state.dead {
        return StepResult::Failure;
    }

    state.frame += 1;
    if state.frame == MAX_FRAMES {
        state.dead = true;
        return StepResult::Failure;
    }

    if rotation != Rotation::None {
        // Consistency check on the input stream: a rotation inside the
        // cooldown window cannot come from an honest encoder.
        if state.frame - state.last_rotate < ROTATION_COOLDOWN {
            return StepResult::Failure;
        }
        state.last_rotate = state.frame;
        state.rotation = rotation;
    }
    state.accel = accel;

    let mut wheel_f = [[0, GRAVITY_WHEEL], [0, GRAVITY_WHEEL]];
    let mut wheel_m = [0i64; 2];
    let mut bike_f = [0, GRAVITY_BIKE];
    let mut bike_m = 0i64;
    let mut head_f = [0, GRAVITY_HEAD];

    if state.last_rotate == state.frame {
        // Strong kick on the frame a rotation starts.
        if state.rotation == Rotation::Cw {
            bike_m -= ROTATION_KICK;
        } else {
            bike_m += ROTATION_KICK;
        }
    } else if state.frame - state.last_rotate == ROTATION_COOLDOWN / 4 {
        // A quarter of the cooldown later, damp the spin proportionally.
        let spin = i64::from(state.bike.ang_vel) * i64::from(INV_MAX_DELTA_ROT_V);
        if state.rotation == Rotation::Cw {
            bike_m += ROTATION_BRAKE_GAIN * INV_ANG_POS_K.min(-spin);
        } else {
            bike_m -= ROTATION_BRAKE_GAIN * INV_ANG_POS_K.min(spin);
        }
    }

    match state.accel {
        Accel::GasLeft => {
            if state.wheels[0].ang_vel > -MAX_WHEEL_SPIN {
                wheel_m[0] = -DRIVE_TORQUE;
            }
        }
        Accel::GasRight => {
            if state.wheels[1].ang_vel < MAX_WHEEL_SPIN {
                wheel_m[1] = DRIVE_TORQUE;
            }
        }
        Accel::Brake => {
            for i in 0..2 {
                let rel = state.wheels[i].ang_vel.wrapping_sub(state.bike.ang_vel);
                let k = INV_ANG_POS_K
                    .min(i64::from(rel).abs() * i64::from(INV_MAX_BRAKE_DELTA_V));
                wheel_m[i] -= i64::from(sign(rel)) * k * BRAKE_FRICTION;
            }
        }
        Accel::Idle => {}
    }

    // Axis-aligned unit vectors of the bike frame.
    let hx = cos16((state.bike.ang_pos >> 16) as i16);
    let hy = sin16((state.bike.ang_pos >> 16) as i16);

    // Intended wheel and head seats relative to the bike centre.
    let w0_seat = [
        -q31_mul(hx, BIKE_OFFSET_X) + q31_mul(hy, BIKE_OFFSET_Y),
        -q31_mul(hy, BIKE_OFFSET_X) - q31_mul(hx, BIKE_OFFSET_Y),
    ];
    let w1_seat = [
        q31_mul(hx, BIKE_OFFSET_X) + q31_mul(hy, BIKE_OFFSET_Y),
        q31_mul(hy, BIKE_OFFSET_X) - q31_mul(hx, BIKE_OFFSET_Y),
    ];
    let head_seat = [-q31_mul(hy, HEAD_OFFSET), q31_mul(hx, HEAD_OFFSET)];

    couple_bike_wheel(
        &state.bike,
        &state.wheels[0],
        w0_seat,
        &mut wheel_f[0],
        &mut bike_f,
        &mut bike_m,
    );
    couple_bike_wheel(
        &state.bike,
        &state.wheels[1],
        w1_seat,
        &mut wheel_f[1],
        &mut bike_f,
        &mut bike_m,
    );
    couple_bike_head(&state.bike, &state.head, head_seat, &mut head_f);

    for i in 0..2 {
        if !advance_wheel(&mut state.wheels[i], wheel_f[i], wheel_m[i], world) {
            state.dead = true;
            return StepResult::Failure;
        }
    }

    state.bike.ang_pos = state.bike.ang_pos.wrapping_add(state.bike.ang_vel);
    state.bike.ang_vel = state
        .bike
        .ang_vel
        .wrapping_add((bike_m / BIKE_ANG_MASS_DIV_DT) as i32);
    state.bike.pos[0] = state.bike.pos[0].wrapping_add(state.bike.vel[0]);
    state.bike.pos[1] = state.bike.pos[1].wrapping_add(state.bike.vel[1]);
    state.bike.vel[0] = state
        .bike
        .vel[0]
        .wrapping_add((bike_f[0] / BIKE_MASS_DIV_DT) as i32);
    state.bike.vel[1] = state
        .bike
        .vel[1]
        .wrapping_add((bike_f[1] / BIKE_MASS_DIV_DT) as i32);

    state.head.pos[0] = state.head.pos[0].wrapping_add(state.head.vel[0]);
    state.head.pos[1] = state.head.pos[1].wrapping_add(state.head.vel[1]);
    state.head.vel[0] = state
        .head
        .vel[0]
        .wrapping_add((head_f[0] / HEAD_MASS_DIV_DT) as i32);
    state.head.vel[1] = state
        .head
        .vel[1]
        .wrapping_add((head_f[1] / HEAD_MASS_DIV_DT) as i32);

    state.finish_dist_sq = finish_distance_sq(state.bike.pos, FINISH);

    if is_dist_less(state.wheels[0].pos, FINISH, FINISH_CAPTURE_WHEEL)
        || is_dist_less(state.wheels[1].pos, FINISH, FINISH_CAPTURE_WHEEL)
        || is_dist_less(state.head.pos, FINISH, FINISH_CAPTURE_HEAD)
    {
        return StepResult::Success;
    }

    if world.ground_clearance(state.head.pos) < HEAD_RADIUS_65536 {
        state.dead = true;
        return StepResult::Failure;
    }

    StepResult::Continue
}
