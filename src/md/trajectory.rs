/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! Result types shared by the PCP generator and the gravity-assist search
//! (spec §3: `PCPResult`, `GAResult`, `Trajectory`).

use hifitime::Epoch;
use nalgebra::Vector3;

/// One feasible (depart, arrive) cell of a porkchop sweep. `None` cells
/// (Lambert/ephemeris failure) are sentinels that downstream consumers skip
/// (spec §4.4).
#[derive(Debug, Clone, Copy)]
pub struct PCPCell {
    pub c3: f64,
    pub vinf_arrival_scalar: f64,
    pub vinf_departure_scalar: f64,
    pub vinf_departure_vec: Vector3<f64>,
    pub vinf_arrival_vec: Vector3<f64>,
}

/// A `depart_epoch -> [arrive_offset]` grid (spec §3: PCPResult). Rows are
/// keyed by rounded TAI seconds so the map has a total order; `arrive_offsets_days`
/// gives the arrival-offset axis shared by every row.
#[derive(Debug, Clone, Default)]
pub struct PCPResult {
    pub rows: Vec<(Epoch, Vec<Option<PCPCell>>)>,
    pub arrive_offsets_days: Vec<f64>,
}

impl PCPResult {
    pub fn new(arrive_offsets_days: Vec<f64>) -> Self {
        Self {
            rows: Vec::new(),
            arrive_offsets_days,
        }
    }

    pub fn push_row(&mut self, depart_epoch: Epoch, row: Vec<Option<PCPCell>>) {
        self.rows.push((depart_epoch, row));
    }

    /// The feasible cell with the smallest C3, if any (used to seed GA-PCP
    /// branch evaluation and for porkchop-optimum regression tests).
    pub fn min_c3_cell(&self) -> Option<(Epoch, f64, &PCPCell)> {
        self.rows
            .iter()
            .flat_map(|(epoch, row)| {
                row.iter()
                    .zip(self.arrive_offsets_days.iter())
                    .filter_map(move |(cell, offset)| cell.as_ref().map(|c| (*epoch, *offset, c)))
            })
            .min_by(|(_, _, a), (_, _, b)| a.c3.partial_cmp(&b.c3).unwrap())
    }
}

/// Per-flyby record produced by the gravity-assist search (spec §3: GAResult).
#[derive(Debug, Clone, Copy)]
pub struct GAResult {
    pub body_closest_approach_epoch: Epoch,
    pub delta_v: f64,
    pub periapsis_radius: f64,
    pub b_dot_t: f64,
    pub b_dot_r: f64,
    /// Resonance phase, present only for a same-body consecutive flyby
    /// (spec §4.5).
    pub resonance_phase: Option<f64>,
}

/// A fully constrained launch -> N flybys -> arrival trajectory, produced
/// only when every leg satisfies its constraints (spec §3: Trajectory).
#[derive(Debug, Clone)]
pub struct Trajectory {
    pub launch_epoch: Epoch,
    pub launch_c3: f64,
    pub launch_rla: f64,
    pub launch_dla: f64,
    pub flybys: Vec<GAResult>,
    pub arrival_epoch: Epoch,
    pub arrival_vinf: f64,
}
