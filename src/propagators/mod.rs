/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! Fixed-step RK4 and adaptive RKF7(8) integrators driving the EOM of
//! `dynamics::eom`, plus the `Propagator` that steps a `SpacecraftState`
//! between waypoints and publishes every accepted step to an observer
//! channel under back-pressure (spec §4.1, §5).

use crate::cosmic::body::CelestialBody;
use crate::cosmic::orbit::Orbit;
use crate::cosmic::spacecraft::{Spacecraft, SpacecraftState};
use crate::dynamics::eom::{eom_rv_stm, extract_rv, extract_stm, identity_stm_state, ThirdBody};
use crate::dynamics::perturbations::Perturbations;
use crate::errors::{AstroError, AstroResult, WarningLog};
use hifitime::Epoch;
use nalgebra::{Matrix3, SVector, Vector3, Vector6};
use hifitime::TimeUnitHelper;
use std::sync::mpsc::SyncSender;
use std::time::Instant;

/// Details of the previous integration step, mirroring the teacher's
/// `IntegrationDetails` (`step`, `error`, `attempts`).
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegrationDetails {
    pub step_s: f64,
    pub error: f64,
    pub attempts: u8,
}

/// How the integrator advances time: a constant step, or a Dormand-Prince-
/// class embedded 8(7) step with a PI controller bounded by `(h_min, h_max)`
/// and per-component absolute/relative tolerances (spec §4.1).
#[derive(Debug, Clone, Copy)]
pub enum StepMode {
    Fixed {
        step_s: f64,
    },
    Adaptive {
        h_min_s: f64,
        h_max_s: f64,
        abstol: f64,
        reltol: f64,
        max_attempts: u8,
    },
}

/// Integrator configuration, mirroring the teacher's `PropOpts` builder
/// (`with_fixed_step` / `with_adaptive_step` / `Default`).
#[derive(Debug, Clone, Copy)]
pub struct PropOpts {
    pub mode: StepMode,
    /// Wall-clock propagation budget (spec §5); `None` disables the guard.
    pub max_propagation_time_s: Option<f64>,
}

impl PropOpts {
    pub fn with_fixed_step(step_s: f64) -> Self {
        Self {
            mode: StepMode::Fixed { step_s },
            max_propagation_time_s: None,
        }
    }

    pub fn with_adaptive_step(h_min_s: f64, h_max_s: f64, abstol: f64, reltol: f64) -> Self {
        Self {
            mode: StepMode::Adaptive {
                h_min_s,
                h_max_s,
                abstol,
                reltol,
                max_attempts: 50,
            },
            max_propagation_time_s: None,
        }
    }

    pub fn with_max_propagation_time(mut self, seconds: f64) -> Self {
        self.max_propagation_time_s = Some(seconds);
        self
    }
}

impl Default for PropOpts {
    /// DP8(7) GMAT-matching defaults (spec §6): abstol 1e-12, reltol 1e-10.
    fn default() -> Self {
        Self {
            mode: StepMode::Adaptive {
                h_min_s: 1e-3,
                h_max_s: 2700.0,
                abstol: 1e-12,
                reltol: 1e-10,
                max_attempts: 50,
            },
            max_propagation_time_s: None,
        }
    }
}

/// Classical four-stage Runge-Kutta step.
pub fn rk4_step<const N: usize>(
    f: &impl Fn(&SVector<f64, N>) -> SVector<f64, N>,
    y: &SVector<f64, N>,
    h: f64,
) -> SVector<f64, N> {
    let k1 = f(y);
    let k2 = f(&(y + k1 * (h / 2.0)));
    let k3 = f(&(y + k2 * (h / 2.0)));
    let k4 = f(&(y + k3 * h));
    y + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (h / 6.0)
}

// Fehlberg 7(8), 13-stage embedded pair (NASA TR R-287): the "precise"
// adaptive integrator this crate calls DP8(7), matching the GMAT-style
// eighth-order-solution/seventh-order-error-estimate contract of spec §4.1.
const RKF78_A: [[f64; 12]; 13] = [
    [0.0; 12],
    [2.0 / 27.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 36.0, 1.0 / 12.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 24.0, 0.0, 1.0 / 8.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [5.0 / 12.0, 0.0, -25.0 / 16.0, 25.0 / 16.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 20.0, 0.0, 0.0, 1.0 / 4.0, 1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [-25.0 / 108.0, 0.0, 0.0, 125.0 / 108.0, -65.0 / 27.0, 125.0 / 54.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [31.0 / 300.0, 0.0, 0.0, 0.0, 61.0 / 225.0, -2.0 / 9.0, 13.0 / 900.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [2.0, 0.0, 0.0, -53.0 / 6.0, 704.0 / 45.0, -107.0 / 9.0, 67.0 / 90.0, 3.0, 0.0, 0.0, 0.0, 0.0],
    [
        -91.0 / 108.0,
        0.0,
        0.0,
        23.0 / 108.0,
        -976.0 / 135.0,
        311.0 / 54.0,
        -19.0 / 60.0,
        17.0 / 6.0,
        -1.0 / 12.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        2383.0 / 4100.0,
        0.0,
        0.0,
        -341.0 / 164.0,
        4496.0 / 1025.0,
        -301.0 / 82.0,
        2133.0 / 4100.0,
        45.0 / 82.0,
        45.0 / 164.0,
        18.0 / 41.0,
        0.0,
        0.0,
    ],
    [
        3.0 / 205.0,
        0.0,
        0.0,
        0.0,
        0.0,
        -6.0 / 41.0,
        -3.0 / 205.0,
        -3.0 / 41.0,
        3.0 / 41.0,
        6.0 / 41.0,
        0.0,
        0.0,
    ],
    [
        -1777.0 / 4100.0,
        0.0,
        0.0,
        -341.0 / 164.0,
        4496.0 / 1025.0,
        -289.0 / 82.0,
        2193.0 / 4100.0,
        51.0 / 82.0,
        33.0 / 164.0,
        12.0 / 41.0,
        0.0,
        1.0,
    ],
];

const RKF78_B8: [f64; 13] = [
    41.0 / 840.0,
    0.0,
    0.0,
    0.0,
    0.0,
    34.0 / 105.0,
    9.0 / 35.0,
    9.0 / 35.0,
    9.0 / 280.0,
    9.0 / 280.0,
    41.0 / 840.0,
    0.0,
    0.0,
];

const RKF78_B7: [f64; 13] = [
    0.0,
    0.0,
    0.0,
    0.0,
    0.0,
    34.0 / 105.0,
    9.0 / 35.0,
    9.0 / 35.0,
    9.0 / 280.0,
    9.0 / 280.0,
    0.0,
    41.0 / 840.0,
    41.0 / 840.0,
];

/// One embedded RKF7(8) attempt: returns the 8th-order state, the weighted
/// RMS error estimate against the 7th-order solution, and the stage count.
fn rkf78_attempt<const N: usize>(
    f: &impl Fn(&SVector<f64, N>) -> SVector<f64, N>,
    y: &SVector<f64, N>,
    h: f64,
    abstol: f64,
    reltol: f64,
) -> (SVector<f64, N>, f64) {
    let mut k: Vec<SVector<f64, N>> = Vec::with_capacity(13);
    for i in 0..13 {
        let mut yi = *y;
        for (j, kj) in k.iter().enumerate() {
            yi += *kj * (h * RKF78_A[i][j]);
        }
        k.push(f(&yi));
    }
    let mut y8 = *y;
    let mut y7 = *y;
    for i in 0..13 {
        y8 += k[i] * (h * RKF78_B8[i]);
        y7 += k[i] * (h * RKF78_B7[i]);
    }
    let mut sum_sq = 0.0;
    for idx in 0..N {
        let scale = abstol + reltol * y8[idx].abs().max(y[idx].abs());
        let e = (y8[idx] - y7[idx]) / scale.max(f64::EPSILON);
        sum_sq += e * e;
    }
    let err = (sum_sq / N as f64).sqrt();
    (y8, err)
}

/// Adaptive RKF7(8) step with a PI-style controller: halves/doubles within
/// `(h_min, h_max)` until the weighted error falls within tolerance or the
/// step saturates at `h_min` or `max_attempts` is reached (spec §4.1).
pub fn rkf78_step<const N: usize>(
    f: &impl Fn(&SVector<f64, N>) -> SVector<f64, N>,
    y: &SVector<f64, N>,
    h_init: f64,
    h_min: f64,
    h_max: f64,
    abstol: f64,
    reltol: f64,
    max_attempts: u8,
) -> (SVector<f64, N>, f64, IntegrationDetails) {
    let mut h = h_init.clamp(h_min, h_max);
    let mut attempts = 1u8;
    loop {
        let (y_next, err) = rkf78_attempt(f, y, h, abstol, reltol);
        let accept = err <= 1.0 || h <= h_min || attempts >= max_attempts;
        if accept {
            let growth = if err > 0.0 {
                0.9 * err.powf(-1.0 / 8.0)
            } else {
                5.0
            };
            let next_h = (h * growth.clamp(0.2, 5.0)).clamp(h_min, h_max);
            return (
                y_next,
                next_h,
                IntegrationDetails {
                    step_s: h,
                    error: err,
                    attempts,
                },
            );
        }
        let shrink = 0.9 * err.powf(-1.0 / 7.0);
        h = (h * shrink.clamp(0.2, 1.0)).max(h_min);
        attempts += 1;
    }
}

/// Signals end-of-stream to a state observer (spec §4.1: "the subscribed
/// sink is signaled end-of-stream").
#[derive(Debug, Clone)]
pub enum StateEvent {
    Step(SpacecraftState),
    EndOfStream,
}

/// Drives a `Spacecraft`'s orbit between waypoint/maneuver epochs, emitting
/// every accepted step to a bounded observer channel. Back-pressure is
/// mandatory: `SyncSender::send` blocks when the channel is full (spec §5).
pub struct Propagator {
    pub body: CelestialBody,
    pub perturbations: Perturbations,
    pub third_bodies: Vec<ThirdBody>,
    pub drag_bc_inv: Option<f64>,
    pub opts: PropOpts,
    pub carry_stm: bool,
    state: SpacecraftState,
    observer: Option<SyncSender<StateEvent>>,
    pub warnings: WarningLog,
    details: IntegrationDetails,
}

impl Propagator {
    pub fn new(initial: SpacecraftState, body: CelestialBody, perturbations: Perturbations, opts: PropOpts) -> Self {
        Self {
            body,
            perturbations,
            third_bodies: Vec::new(),
            drag_bc_inv: None,
            opts,
            carry_stm: false,
            state: initial,
            observer: None,
            warnings: WarningLog::default(),
            details: IntegrationDetails::default(),
        }
    }

    pub fn register_state_observer(&mut self, sink: SyncSender<StateEvent>) {
        self.observer = Some(sink);
    }

    pub fn current_state(&self) -> &SpacecraftState {
        &self.state
    }

    pub fn latest_details(&self) -> IntegrationDetails {
        self.details
    }

    /// Re-expresses the reference orbit about `target_body` and switches the
    /// propagator's own central body to match, so that subsequent EOM
    /// evaluations are relative to the new body (spec §3: `Action::SwitchFrame`).
    pub fn reframe(&mut self, target_body: CelestialBody, ephemeris: &dyn crate::cosmic::ephemeris::EphemerisProvider) -> AstroResult<()> {
        let new_orbit = self.state.orbit.reframe(target_body, ephemeris)?;
        self.state.orbit = new_orbit;
        self.body = target_body;
        Ok(())
    }

    fn emit(&self, event: StateEvent) {
        if let Some(sink) = &self.observer {
            if sink.send(event).is_err() {
                log::warn!("state observer channel closed; dropping further emissions");
            }
        }
    }

    /// Advances the reference state to `epoch`. Negative elapsed time is a
    /// no-op returning the unchanged initial state (spec §4.1). Scheduled
    /// maneuvers whose epoch is crossed by this call are applied as an
    /// instantaneous delta-v (RNC frame, rotated into inertial) before the
    /// step that would cross them.
    pub fn propagate_to(&mut self, epoch: Epoch, spacecraft: &mut Spacecraft) -> AstroResult<SpacecraftState> {
        let elapsed = (epoch - self.state.epoch).to_seconds();
        if elapsed < 0.0 {
            log::debug!("negative propagation time requested; no-op");
            return Ok(self.state.clone());
        }

        let wall_clock_start = Instant::now();
        let mut remaining = elapsed;

        // Maneuvers strictly between the current epoch and the target epoch,
        // in chronological order.
        let due: Vec<_> = spacecraft
            .maneuvers
            .range((self.state.epoch.to_tai_seconds().round() as i64 + 1)..=(epoch.to_tai_seconds().round() as i64))
            .map(|(_, m)| *m)
            .collect();
        let mut maneuver_iter = due.into_iter().peekable();

        while remaining > 0.0 {
            if let Some(max_s) = self.opts.max_propagation_time_s {
                if wall_clock_start.elapsed().as_secs_f64() > max_s {
                    return Err(AstroError::PropagationTimedOut { max_seconds: max_s });
                }
            }

            let next_maneuver_dt = maneuver_iter
                .peek()
                .map(|m: &crate::cosmic::spacecraft::ScheduledManeuver| (m.epoch - self.state.epoch).to_seconds())
                .filter(|dt| *dt >= 0.0 && *dt <= remaining);

            let step_target = next_maneuver_dt.unwrap_or(remaining);
            self.advance_by(step_target.min(remaining))?;
            remaining -= step_target.min(remaining);

            if let Some(dt) = next_maneuver_dt {
                if (dt - step_target).abs() < 1e-9 {
                    if let Some(maneuver) = maneuver_iter.next() {
                        self.apply_maneuver(&maneuver, spacecraft);
                    }
                }
            }
        }

        self.emit(StateEvent::EndOfStream);
        Ok(self.state.clone())
    }

    fn apply_maneuver(&mut self, maneuver: &crate::cosmic::spacecraft::ScheduledManeuver, spacecraft: &mut Spacecraft) {
        let (r, v) = self.state.orbit.rv();
        let rnc_to_inertial = rnc_rotation(r, v);
        let dv_inertial = rnc_to_inertial * maneuver.dv_rnc;
        let v_new = v + dv_inertial;
        if let Ok(new_orbit) = Orbit::from_rv(r, v_new, self.state.epoch, self.state.orbit.central_body) {
            self.state.orbit = new_orbit;
        }
        if let Some(thruster) = spacecraft.thruster_table.first() {
            spacecraft.consume_fuel(dv_inertial.norm(), thruster.isp_s);
            self.state.mass_kg = spacecraft.total_mass_kg();
        }
    }

    /// Integrates a single sub-interval of up to `dt_s` seconds, honoring
    /// fixed or adaptive stepping, and checks for the collision edge case.
    fn advance_by(&mut self, dt_s: f64) -> AstroResult<()> {
        if dt_s <= 0.0 {
            return Ok(());
        }
        let body = self.body;
        let perturbations = self.perturbations;
        let third_bodies = self.third_bodies.clone();
        let drag_bc_inv = self.drag_bc_inv;

        let mut t_elapsed = 0.0;
        match self.opts.mode {
            StepMode::Fixed { step_s } => {
                let mut h = step_s.min(dt_s);
                while t_elapsed < dt_s {
                    h = h.min(dt_s - t_elapsed);
                    self.step_fixed(h, &body, &perturbations, &third_bodies, drag_bc_inv)?;
                    t_elapsed += h;
                    h = step_s;
                }
            }
            StepMode::Adaptive {
                h_min_s,
                h_max_s,
                abstol,
                reltol,
                max_attempts,
            } => {
                let mut h = h_max_s.min(dt_s);
                while t_elapsed < dt_s {
                    h = h.min(dt_s - t_elapsed);
                    let next_h = self.step_adaptive(h, h_min_s, h_max_s, abstol, reltol, max_attempts, &body, &perturbations, &third_bodies, drag_bc_inv)?;
                    t_elapsed += self.details.step_s;
                    h = next_h;
                }
            }
        }
        Ok(())
    }

    fn step_fixed(
        &mut self,
        h: f64,
        body: &CelestialBody,
        perturbations: &Perturbations,
        third_bodies: &[ThirdBody],
        drag_bc_inv: Option<f64>,
    ) -> AstroResult<()> {
        let y = self.pack_state();
        let f = |y: &SVector<f64, 42>| -> SVector<f64, 42> { eom_rv_stm(y, body, perturbations, third_bodies, drag_bc_inv) };
        let y_next = rk4_step(&f, &y, h);
        self.details = IntegrationDetails {
            step_s: h,
            error: 0.0,
            attempts: 1,
        };
        self.commit_state(y_next, h)
    }

    #[allow(clippy::too_many_arguments)]
    fn step_adaptive(
        &mut self,
        h_init: f64,
        h_min: f64,
        h_max: f64,
        abstol: f64,
        reltol: f64,
        max_attempts: u8,
        body: &CelestialBody,
        perturbations: &Perturbations,
        third_bodies: &[ThirdBody],
        drag_bc_inv: Option<f64>,
    ) -> AstroResult<f64> {
        let y = self.pack_state();
        let f = |y: &SVector<f64, 42>| -> SVector<f64, 42> { eom_rv_stm(y, body, perturbations, third_bodies, drag_bc_inv) };
        let (y_next, next_h, details) = rkf78_step(&f, &y, h_init, h_min, h_max, abstol, reltol, max_attempts);
        self.details = details;
        self.commit_state(y_next, details.step_s)?;
        Ok(next_h)
    }

    fn pack_state(&self) -> SVector<f64, 42> {
        let (r, v) = self.state.orbit.rv();
        let rv = Vector6::new(r.x, r.y, r.z, v.x, v.y, v.z);
        if self.carry_stm {
            let mut flat = SVector::<f64, 36>::zeros();
            let phi = self.state.stm;
            for i in 0..6 {
                for j in 0..6 {
                    flat[i * 6 + j] = phi[(i, j)];
                }
            }
            let mut out = identity_stm_state(rv);
            out.fixed_rows_mut::<36>(6).copy_from(&flat);
            out
        } else {
            identity_stm_state(rv)
        }
    }

    fn commit_state(&mut self, packed: SVector<f64, 42>, step_s: f64) -> AstroResult<()> {
        let rv = extract_rv(&packed);
        let r = rv.fixed_rows::<3>(0).into_owned();
        let v = rv.fixed_rows::<3>(3).into_owned();

        if r.norm() < self.state.orbit.central_body.eq_radius {
            self.warnings.record_collision();
        }

        let new_epoch = self.state.epoch + step_s.seconds();
        let new_orbit = Orbit::from_rv(r, v, new_epoch, self.state.orbit.central_body)?;
        self.state.epoch = new_epoch;
        self.state.orbit = new_orbit;
        if self.carry_stm {
            // `pack_state` seeds the variational block with the cumulative
            // Phi(t_i,t0) rather than identity, so by linearity of dPhi/dt =
            // A(t)Phi the integrated result already is the new cumulative
            // Phi(t_i+1,t0); it replaces the old value rather than composing
            // with it.
            self.state.stm = extract_stm(&packed);
        }
        self.emit(StateEvent::Step(self.state.clone()));
        Ok(())
    }
}

/// Rotation matrix from the radial/normal/cross (RNC) frame to inertial,
/// built from the current (R, V) of the reference orbit (spec §3, §4.1).
pub fn rnc_rotation(r: Vector3<f64>, v: Vector3<f64>) -> Matrix3<f64> {
    let radial = r.normalize();
    let cross = r.cross(&v).normalize();
    let normal = cross.cross(&radial).normalize();
    Matrix3::from_columns(&[radial, normal, cross])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosmic::body::lookup;
    use hifitime::Epoch;

    fn geo_state() -> SpacecraftState {
        let epoch = Epoch::from_gregorian_utc_at_midnight(2020, 1, 1);
        let earth = lookup("Earth").unwrap();
        let o = Orbit::from_oe(42_164.0, 1e-4, 1e-4f64.to_radians(), 5f64.to_radians(), 10f64.to_radians(), 0.0, epoch, earth);
        SpacecraftState::new(epoch, o, 1000.0)
    }

    #[test]
    fn negative_propagation_time_is_a_no_op() {
        let mut sc = Spacecraft::new(900.0, 100.0);
        let init = geo_state();
        let mut prop = Propagator::new(init.clone(), init.orbit.central_body, Perturbations::default(), PropOpts::with_fixed_step(60.0));
        let past = init.epoch - 100.0.seconds();
        let result = prop.propagate_to(past, &mut sc).unwrap();
        assert_eq!(result.epoch, init.epoch);
    }

    #[test]
    fn energy_conserved_over_one_period_fixed_step() {
        let mut sc = Spacecraft::new(900.0, 100.0);
        let init = geo_state();
        let period = init.orbit.period().unwrap();
        let mut prop = Propagator::new(init.clone(), init.orbit.central_body, Perturbations::default(), PropOpts::with_fixed_step(60.0));
        let target = init.epoch + period.seconds();
        let result = prop.propagate_to(target, &mut sc).unwrap();
        let e0 = init.orbit.energy();
        let e1 = result.orbit.energy();
        assert!(((e1 - e0) / e0).abs() < 1e-8, "relative energy drift: {}", (e1 - e0) / e0);
    }

    #[test]
    fn energy_conserved_adaptive_step() {
        let mut sc = Spacecraft::new(900.0, 100.0);
        let init = geo_state();
        let period = init.orbit.period().unwrap();
        let mut prop = Propagator::new(init.clone(), init.orbit.central_body, Perturbations::default(), PropOpts::default());
        let target = init.epoch + period.seconds();
        let result = prop.propagate_to(target, &mut sc).unwrap();
        let e0 = init.orbit.energy();
        let e1 = result.orbit.energy();
        assert!(((e1 - e0) / e0).abs() < 1e-6, "relative energy drift: {}", (e1 - e0) / e0);
    }

    #[test]
    fn stm_identity_at_zero_elapsed_then_composes() {
        let mut sc = Spacecraft::new(900.0, 100.0);
        let mut init = geo_state();
        init.stm = nalgebra::Matrix6::identity();
        let mut prop = Propagator::new(init.clone(), init.orbit.central_body, Perturbations::default(), PropOpts::with_fixed_step(300.0));
        prop.carry_stm = true;
        let mid = init.epoch + (12.0 * 3600.0).seconds();
        let end = init.epoch + (24.0 * 3600.0).seconds();

        let s1 = prop.propagate_to(mid, &mut sc).unwrap();
        let phi_t1_t0 = s1.stm;

        let s2 = prop.propagate_to(end, &mut sc).unwrap();
        let phi_t2_t0 = s2.stm;

        // Phi(t2,t0) should equal the STM accumulated over the second half
        // times Phi(t1,t0); verify consistency to 1e-6 per element by
        // re-deriving the second-half-only STM from a fresh propagator.
        let mut prop2 = Propagator::new(s1.clone(), s1.orbit.central_body, Perturbations::default(), PropOpts::with_fixed_step(300.0));
        prop2.carry_stm = true;
        prop2.state_mut_for_test().stm = nalgebra::Matrix6::identity();
        let s2b = prop2.propagate_to(end, &mut sc).unwrap();
        let phi_t2_t1 = s2b.stm;

        let composed = phi_t2_t1 * phi_t1_t0;
        assert!((composed - phi_t2_t0).norm() < 1e-6 * phi_t2_t0.norm().max(1.0));
    }

    impl Propagator {
        #[cfg(test)]
        fn state_mut_for_test(&mut self) -> &mut SpacecraftState {
            &mut self.state
        }
    }
}
