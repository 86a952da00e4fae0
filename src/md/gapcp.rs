/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! The gravity-assist trajectory search (spec §4.5): a depth-first,
//! concurrent walker over flyby planets threading Lambert arcs through a
//! patched-conic chain, pruning on C3/periapsis/delta-v/v-infinity and
//! streaming feasible [`Trajectory`] values to a result sink.
//!
//! Concurrency follows spec §5: each feasible branch is spawned onto the
//! `rayon` thread pool via [`rayon::Scope::spawn`], which bounds in-flight
//! work to the pool's worker count (`rayon::current_num_threads()`) acting
//! as the counting semaphore; `sink` is a bounded `mpsc` channel and the
//! enclosing `rayon::scope` call is the wait-group that will not return
//! until every spawned worker has finished.

use crate::cosmic::body::CelestialBody;
use crate::cosmic::ephemeris::EphemerisProvider;
use crate::errors::AstroResult;
use crate::md::bplane;
use crate::md::lambert::TransferType;
use crate::md::pcp::{self, PcpRequest, SweepWindow};
use crate::md::trajectory::{GAResult, Trajectory};
use hifitime::{Epoch, TimeUnitHelper};
use nalgebra::Vector3;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;

/// Cooperative cancellation token checked at leg boundaries (spec §5); an
/// in-flight Lambert iteration always runs to completion since it is itself
/// bounded.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The launch leg: body, launch window, and the maximum allowed C3.
#[derive(Debug, Clone, Copy)]
pub struct LaunchLeg<'a> {
    pub body: &'a str,
    pub window: SweepWindow,
    pub max_c3: f64,
}

/// One intermediate flyby leg (spec §4.5): an optional max delta-v and an
/// optional minimum periapsis radius, the latter given as a factor of the
/// flyby body's equatorial radius.
#[derive(Debug, Clone, Copy)]
pub struct FlybyLeg<'a> {
    pub body: &'a str,
    pub window: SweepWindow,
    pub max_delta_v: Option<f64>,
    pub min_periapsis_radius_factor: Option<f64>,
}

/// The arrival leg: body, arrival window, and the maximum allowed v-infinity.
#[derive(Debug, Clone, Copy)]
pub struct ArrivalLeg<'a> {
    pub body: &'a str,
    pub window: SweepWindow,
    pub max_vinf: f64,
}

/// The full gravity-assist search request (spec §4.5).
pub struct GaPcpRequest<'a> {
    pub launch: LaunchLeg<'a>,
    pub flybys: &'a [FlybyLeg<'a>],
    pub arrival: ArrivalLeg<'a>,
    pub transfer_types: &'a [TransferType],
    pub cancel: Option<CancelToken>,
}

/// Runs the recursive, concurrent gravity-assist search and streams every
/// fully-constrained [`Trajectory`] to `sink` (spec §4.5). A Lambert or
/// ephemeris failure in one cell prunes that branch only; no single-cell
/// failure aborts the search (spec §4.5, §7).
pub fn search(
    request: &GaPcpRequest,
    ephemeris: &(dyn EphemerisProvider + Sync),
    sink: SyncSender<Trajectory>,
) -> AstroResult<()> {
    let first_stop_body = request.flybys.first().map(|f| f.body).unwrap_or(request.arrival.body);
    let first_stop_window = request.flybys.first().map(|f| f.window).unwrap_or(request.arrival.window);

    let launch_request = PcpRequest {
        launch_body: request.launch.body,
        arrival_body: first_stop_body,
        depart_window: request.launch.window,
        arrive_window: first_stop_window,
        transfer_types: request.transfer_types,
        verbose: false,
    };
    let launch_pcp = pcp::generate(&launch_request, ephemeris)?;

    rayon::scope(|scope| {
        for (depart_epoch, row) in &launch_pcp.rows {
            for (cell, offset_days) in row.iter().zip(launch_pcp.arrive_offsets_days.iter()) {
                let Some(cell) = cell else { continue };
                if cell.c3 > request.launch.max_c3 {
                    log::debug!(
                        "GA-PCP launch cell pruned: C3 {} exceeds max {}",
                        cell.c3,
                        request.launch.max_c3
                    );
                    continue;
                }
                let arrive_epoch = first_stop_window.from + offset_days.days();
                let vinf_departure_vec = cell.vinf_departure_vec;
                let rla = vinf_departure_vec.y.atan2(vinf_departure_vec.x);
                let dla = (vinf_departure_vec.z / vinf_departure_vec.norm()).asin();
                let launch_c3 = cell.c3;
                let vinf_in = cell.vinf_arrival_vec;
                let sink = sink.clone();

                scope.spawn(move |inner_scope| {
                    if request.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                        return;
                    }
                    if request.flybys.is_empty() {
                        // No intermediate flybys: the launch leg's arrival
                        // body *is* the arrival body, so its v-infinity is
                        // the arrival v-infinity, checked directly against
                        // the arrival leg's constraint (mirrors the
                        // final-leg branch of `recurse`).
                        let arrival_vinf = vinf_in.norm();
                        if arrival_vinf > request.arrival.max_vinf {
                            log::debug!(
                                "GA-PCP trajectory pruned at arrival, v-infinity {} exceeds max {}",
                                arrival_vinf,
                                request.arrival.max_vinf
                            );
                            return;
                        }
                        let trajectory = Trajectory {
                            launch_epoch: *depart_epoch,
                            launch_c3,
                            launch_rla: rla,
                            launch_dla: dla,
                            flybys: Vec::new(),
                            arrival_epoch: arrive_epoch,
                            arrival_vinf,
                        };
                        if sink.send(trajectory).is_err() {
                            log::warn!("GA-PCP result sink closed; dropping further trajectories");
                        }
                        return;
                    }
                    recurse(
                        request,
                        ephemeris,
                        0,
                        vinf_in,
                        arrive_epoch,
                        Vec::new(),
                        *depart_epoch,
                        launch_c3,
                        rla,
                        dla,
                        sink,
                        inner_scope,
                    );
                });
            }
        }
    });
    Ok(())
}

/// Recurses into flyby `flyby_idx`: `vinf_in` is the incoming hyperbolic
/// excess velocity vector at that flyby's body, `epoch_at_body` the epoch of
/// closest approach. Terminates either by recursing into the next leg or, at
/// the last flyby, by checking the arrival leg's v-infinity constraint and
/// emitting a [`Trajectory`].
#[allow(clippy::too_many_arguments)]
fn recurse<'a>(
    request: &'a GaPcpRequest<'a>,
    ephemeris: &'a (dyn EphemerisProvider + Sync),
    flyby_idx: usize,
    vinf_in: Vector3<f64>,
    epoch_at_body: Epoch,
    path: Vec<GAResult>,
    launch_epoch: Epoch,
    launch_c3: f64,
    launch_rla: f64,
    launch_dla: f64,
    sink: SyncSender<Trajectory>,
    scope: &rayon::Scope<'a>,
) {
    if request.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
        return;
    }

    let Some(leg) = request.flybys.get(flyby_idx) else {
        log::debug!("GA-PCP recurse called with out-of-range flyby index {flyby_idx}; dropping branch");
        return;
    };
    let next_idx = flyby_idx + 1;
    let next_body = request.flybys.get(next_idx).map(|f| f.body).unwrap_or(request.arrival.body);
    let next_window = request.flybys.get(next_idx).map(|f| f.window).unwrap_or(request.arrival.window);

    // The departure epoch for this leg is pinned to the exact epoch of
    // closest approach at the current body; a single-point sweep window
    // reuses the same PCP machinery as the launch leg.
    let depart_window = SweepWindow {
        from: epoch_at_body,
        until: epoch_at_body,
        resolution_days: 1.0,
    };
    let leg_request = PcpRequest {
        launch_body: leg.body,
        arrival_body: next_body,
        depart_window,
        arrive_window: next_window,
        transfer_types: request.transfer_types,
        verbose: false,
    };
    let leg_pcp = match pcp::generate(&leg_request, ephemeris) {
        Ok(p) => p,
        Err(e) => {
            log::debug!("GA-PCP leg {} pruned, PCP generation failed: {}", flyby_idx, e);
            return;
        }
    };
    let Some((_, row)) = leg_pcp.rows.first() else {
        return;
    };

    let body: CelestialBody = match crate::cosmic::body::lookup(leg.body) {
        Ok(b) => b,
        Err(e) => {
            log::debug!("GA-PCP leg {} pruned, unknown body: {}", flyby_idx, e);
            return;
        }
    };

    for (cell, offset_days) in row.iter().zip(leg_pcp.arrive_offsets_days.iter()) {
        let Some(cell) = cell else { continue };
        let vinf_out = cell.vinf_departure_vec;

        let delta_v = (vinf_out.norm() - vinf_in.norm()).abs();
        if let Some(max_dv) = leg.max_delta_v {
            if delta_v > max_dv {
                log::debug!("GA-PCP flyby at {} pruned, delta-v {} exceeds max {}", leg.body, delta_v, max_dv);
                continue;
            }
        }

        let periapsis_radius = match flyby_periapsis_radius(vinf_in, vinf_out, body.gm) {
            Some(rp) => rp,
            None => {
                log::debug!("GA-PCP flyby at {} pruned, turn angle geometrically infeasible", leg.body);
                continue;
            }
        };
        if let Some(factor) = leg.min_periapsis_radius_factor {
            let min_rp = factor * body.eq_radius;
            if periapsis_radius < min_rp {
                log::debug!(
                    "GA-PCP flyby at {} pruned, periapsis {} km below minimum {} km",
                    leg.body,
                    periapsis_radius,
                    min_rp
                );
                continue;
            }
        }

        let h_vec = vinf_in.cross(&vinf_out);
        let b_plane = bplane::compute(vinf_in, h_vec, body.gm, periapsis_radius);

        let resonance_phase = if flyby_idx > 0 && request.flybys[flyby_idx - 1].body == leg.body {
            Some(vinf_in.angle(&vinf_out))
        } else {
            None
        };

        let ga_result = GAResult {
            body_closest_approach_epoch: epoch_at_body,
            delta_v,
            periapsis_radius,
            b_dot_t: b_plane.b_dot_t,
            b_dot_r: b_plane.b_dot_r,
            resonance_phase,
        };
        let mut new_path = path.clone();
        new_path.push(ga_result);

        let next_epoch = next_window.from + offset_days.days();
        let vinf_next_in = cell.vinf_arrival_vec;

        if next_idx < request.flybys.len() {
            let sink = sink.clone();
            scope.spawn(move |inner_scope| {
                recurse(
                    request,
                    ephemeris,
                    next_idx,
                    vinf_next_in,
                    next_epoch,
                    new_path,
                    launch_epoch,
                    launch_c3,
                    launch_rla,
                    launch_dla,
                    sink,
                    inner_scope,
                );
            });
        } else {
            let arrival_vinf = vinf_next_in.norm();
            if arrival_vinf > request.arrival.max_vinf {
                log::debug!(
                    "GA-PCP trajectory pruned at arrival, v-infinity {} exceeds max {}",
                    arrival_vinf,
                    request.arrival.max_vinf
                );
                continue;
            }
            let trajectory = Trajectory {
                launch_epoch,
                launch_c3,
                launch_rla,
                launch_dla,
                flybys: new_path,
                arrival_epoch: next_epoch,
                arrival_vinf,
            };
            if sink.send(trajectory).is_err() {
                log::warn!("GA-PCP result sink closed; dropping further trajectories");
            }
        }
    }
}

/// Periapsis radius from the incoming/outgoing v-infinity vectors and the
/// flyby body's mu (spec §4.5): the turn angle `psi` between the two vectors
/// satisfies `sin(psi/2) = 1 / (1 + rp * vinf^2 / mu)`, inverted for `rp`.
/// Returns `None` when the geometry is degenerate (near-zero v-infinity or a
/// turn angle of zero, which would require infinite periapsis).
fn flyby_periapsis_radius(vinf_in: Vector3<f64>, vinf_out: Vector3<f64>, mu: f64) -> Option<f64> {
    let vinf_mag = 0.5 * (vinf_in.norm() + vinf_out.norm());
    if vinf_mag < f64::EPSILON {
        return None;
    }
    let cos_psi = (vinf_in.dot(&vinf_out) / (vinf_in.norm() * vinf_out.norm())).clamp(-1.0, 1.0);
    let psi = cos_psi.acos();
    let sin_half_psi = (psi / 2.0).sin();
    if sin_half_psi < 1e-9 {
        return None;
    }
    Some((mu / (vinf_mag * vinf_mag)) * (1.0 / sin_half_psi - 1.0))
}
