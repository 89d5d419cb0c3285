//! Navigation policy.
//!
//! [`step`] is a pure transition `(PolicyState, PolicyInput) -> Decision`;
//! [`decision_step`] snapshots a [`RoverState`], runs one transition and
//! writes the result back.
//!
//! Rules, highest priority first:
//! 1. No bearings at all: creep forward to regenerate perception data.
//! 2. Sample in view: stop beside it, or steer onto it. The first stalled
//!    approach tick tries a throttle burst; a second consecutive one gives
//!    up and stops.
//! 3. Otherwise dispatch on [`Mode`].
//! 4. Independently, request a pickup once stopped next to a sample.

use crate::coords::mean_bearing_deg;
use crate::state::{Control, Mode, RoverState, Tunables};

/// Steering band for terrain following (degrees).
pub const STEER_LIMIT_DEG: f64 = 15.0;
/// In-place search turn while stopped (degrees, to the right).
pub const SEARCH_STEER_DEG: f64 = -15.0;
/// Speed below which forward mode counts a stalled tick.
pub const STALL_SPEED: f64 = 0.05;
/// Stalled ticks tolerated in forward mode before switching to stuck.
pub const STALL_TICKS: u32 = 400;
/// Reversing ticks spent in stuck mode.
pub const STUCK_TICKS: u32 = 300;
/// Stop mode keeps braking above this speed.
pub const STOP_SPEED: f64 = 0.2;
/// Gentle reverse / deceleration throttle.
pub const REVERSE_THROTTLE: f64 = -0.1;

/// Sample approach steering band (degrees); biased to the right-hand wall.
pub const SAMPLE_STEER_BAND: [f64; 2] = [-5.0, 15.0];
/// First stalled tick near a sample: throttle burst and biased steer.
pub const SAMPLE_UNSTALL_THROTTLE: f64 = 2.0;
pub const SAMPLE_UNSTALL_BAND: [f64; 2] = [-10.0, 10.0];
pub const SAMPLE_UNSTALL_BIAS_DEG: f64 = 8.0;
/// Margin below `max_vel` for the sample approach cruise band.
pub const SAMPLE_APPROACH_MARGIN: f64 = 1.0;

/// Mutable policy fields carried between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolicyState {
    pub mode: Mode,
    pub vel_count: u32,
    pub stuck_count: u32,
    pub sample_detected: bool,
    pub send_pickup: bool,
    /// Consecutive stalled ticks while approaching a sample.
    pub sample_stall_ticks: u32,
}

/// Read-only per-tick inputs.
#[derive(Debug, Clone, Copy)]
pub struct PolicyInput<'a> {
    /// Active bearing distribution (radians).
    pub angles: &'a [f64],
    pub vel: f64,
    pub near_sample: bool,
    pub picking_up: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub state: PolicyState,
    pub control: Control,
}

/// One policy transition.
pub fn step(state: PolicyState, input: &PolicyInput<'_>, tunables: &Tunables) -> Decision {
    let mut next = PolicyState {
        sample_stall_ticks: 0,
        ..state
    };
    let control = if input.angles.is_empty() {
        Control::new(tunables.throttle_set, 0.0, 0.0)
    } else if state.sample_detected {
        let c = approach_sample(&mut next, state.sample_stall_ticks, input, tunables);
        next.sample_detected = false;
        c
    } else {
        match state.mode {
            Mode::Forward => forward(&mut next, input, tunables),
            Mode::Stop => stop(&mut next, input, tunables),
            Mode::Stuck => stuck(&mut next),
        }
    };

    if input.near_sample && input.vel == 0.0 && !input.picking_up {
        next.send_pickup = true;
        next.sample_detected = false;
        next.mode = Mode::Forward;
    }

    Decision {
        state: next,
        control,
    }
}

fn approach_sample(
    next: &mut PolicyState,
    stalled_before: u32,
    input: &PolicyInput<'_>,
    t: &Tunables,
) -> Control {
    if input.near_sample {
        return Control::new(0.0, t.brake_set, 0.0);
    }

    let angles = input.angles;
    if input.vel <= 0.0 {
        next.sample_stall_ticks = stalled_before.saturating_add(1);
        if next.sample_stall_ticks == 1 {
            let [lo, hi] = SAMPLE_UNSTALL_BAND;
            let steer = (mean_bearing_deg(angles, lo, hi) + SAMPLE_UNSTALL_BIAS_DEG).clamp(lo, hi);
            return Control::new(SAMPLE_UNSTALL_THROTTLE, 0.0, steer);
        }
        // Still blocked after the burst: give up on this approach.
        next.mode = Mode::Stop;
        return Control::new(0.0, 0.0, SEARCH_STEER_DEG);
    }

    let throttle = if input.vel < t.max_vel - SAMPLE_APPROACH_MARGIN {
        t.throttle_set
    } else {
        REVERSE_THROTTLE
    };
    let steer = mean_bearing_deg(angles, SAMPLE_STEER_BAND[0], SAMPLE_STEER_BAND[1]);
    Control::new(throttle, 0.0, steer)
}

fn forward(next: &mut PolicyState, input: &PolicyInput<'_>, t: &Tunables) -> Control {
    if input.angles.len() < t.stop_forward {
        next.mode = Mode::Stop;
        return Control::new(0.0, t.brake_set, 0.0);
    }

    let throttle = if input.vel < t.max_vel {
        if input.vel.abs() < STALL_SPEED {
            next.vel_count += 1;
            if next.vel_count > STALL_TICKS {
                next.vel_count = 0;
                next.stuck_count = 0;
                next.mode = Mode::Stuck;
                return Control::default();
            }
        } else {
            next.vel_count = 0;
        }
        t.throttle_set
    } else {
        0.0
    };
    let steer = mean_bearing_deg(input.angles, -STEER_LIMIT_DEG, STEER_LIMIT_DEG);
    Control::new(throttle, 0.0, steer)
}

fn stop(next: &mut PolicyState, input: &PolicyInput<'_>, t: &Tunables) -> Control {
    if input.vel > STOP_SPEED {
        return Control::new(0.0, t.brake_set, 0.0);
    }
    if input.angles.len() < t.go_forward {
        return Control::new(0.0, 0.0, SEARCH_STEER_DEG);
    }
    next.mode = Mode::Forward;
    let steer = mean_bearing_deg(input.angles, -STEER_LIMIT_DEG, STEER_LIMIT_DEG);
    Control::new(t.throttle_set, 0.0, steer)
}

fn stuck(next: &mut PolicyState) -> Control {
    next.stuck_count += 1;
    if next.stuck_count > STUCK_TICKS {
        next.stuck_count = 0;
        next.mode = Mode::Forward;
    }
    Control::new(REVERSE_THROTTLE, 0.0, 0.0)
}

/// Run one policy transition against the rover record.
pub fn decision_step(rover: &mut RoverState) -> Control {
    if rover.at_home && !rover.nav.is_empty() {
        rover.start_position = Some(rover.pos);
        rover.at_home = false;
        tracing::info!(x = rover.pos[0], y = rover.pos[1], "home position recorded");
    }

    let prev = PolicyState {
        mode: rover.mode,
        vel_count: rover.vel_count,
        stuck_count: rover.stuck_count,
        sample_detected: rover.sample_detected,
        send_pickup: rover.send_pickup,
        sample_stall_ticks: rover.sample_stall_ticks,
    };
    let input = PolicyInput {
        angles: &rover.nav.angles,
        vel: rover.vel,
        near_sample: rover.near_sample,
        picking_up: rover.picking_up,
    };
    let Decision { state, control } = step(prev, &input, &rover.tunables);

    if state.mode != prev.mode {
        tracing::info!(from = %prev.mode, to = %state.mode, vel = rover.vel, "mode transition");
    }
    if state.send_pickup && !prev.send_pickup {
        tracing::info!(samples = rover.samples_collected, "pickup requested");
    }
    tracing::trace!(
        throttle = control.throttle,
        brake = control.brake,
        steer = control.steer,
        "control"
    );

    rover.mode = state.mode;
    rover.vel_count = state.vel_count;
    rover.stuck_count = state.stuck_count;
    rover.sample_detected = state.sample_detected;
    rover.send_pickup = state.send_pickup;
    rover.sample_stall_ticks = state.sample_stall_ticks;
    rover.control = control;
    control
}
