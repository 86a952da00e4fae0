/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! Porkchop (PCP) grid generation (spec §4.4): a Cartesian-product sweep
//! over (depart, arrive) epoch pairs, calling the Lambert solver once per
//! cell and per configured transfer type.

use crate::cosmic::ephemeris::EphemerisProvider;
use crate::errors::AstroResult;
use crate::md::lambert::{self, TransferType};
use crate::md::trajectory::{PCPCell, PCPResult};
use hifitime::{Epoch, TimeUnitHelper};
use indicatif::ProgressBar;

/// A sweep window: `[from, until]` stepped every `resolution_days`.
#[derive(Debug, Clone, Copy)]
pub struct SweepWindow {
    pub from: Epoch,
    pub until: Epoch,
    pub resolution_days: f64,
}

impl SweepWindow {
    fn epochs(&self) -> Vec<Epoch> {
        let mut out = Vec::new();
        let mut t = self.from;
        while t <= self.until {
            out.push(t);
            t = t + self.resolution_days.days();
        }
        out
    }
}

/// PCP generator configuration (spec §4.4).
pub struct PcpRequest<'a> {
    pub launch_body: &'a str,
    pub arrival_body: &'a str,
    pub depart_window: SweepWindow,
    pub arrive_window: SweepWindow,
    pub transfer_types: &'a [TransferType],
    pub verbose: bool,
}

/// Runs the full Cartesian-product Lambert sweep (spec §4.4). Individual
/// cell failures (Lambert non-convergence, ephemeris unavailability) are
/// logged at debug and recorded as a `None` sentinel; they never abort the
/// sweep.
pub fn generate(request: &PcpRequest, ephemeris: &dyn EphemerisProvider) -> AstroResult<PCPResult> {
    let depart_epochs = request.depart_window.epochs();
    let arrive_epochs = request.arrive_window.epochs();
    let arrive_offsets_days: Vec<f64> = arrive_epochs
        .iter()
        .map(|e| (*e - request.arrive_window.from).to_seconds() / 86_400.0)
        .collect();

    let mut result = PCPResult::new(arrive_offsets_days);
    let progress = if request.verbose {
        Some(ProgressBar::new(depart_epochs.len() as u64))
    } else {
        None
    };

    for depart_epoch in &depart_epochs {
        let mut row = Vec::with_capacity(arrive_epochs.len());
        let launch_state = ephemeris.helio_state(request.launch_body, *depart_epoch);
        let (r_depart, v_depart_body) = match launch_state {
            Ok(state) => state,
            Err(e) => {
                log::debug!("PCP row skipped, launch ephemeris unavailable: {}", e);
                row.resize(arrive_epochs.len(), None);
                result.push_row(*depart_epoch, row);
                if let Some(bar) = &progress {
                    bar.inc(1);
                }
                continue;
            }
        };

        for arrive_epoch in &arrive_epochs {
            let cell = best_cell_for_pair(
                ephemeris,
                request,
                r_depart,
                v_depart_body,
                *depart_epoch,
                *arrive_epoch,
            );
            row.push(cell);
        }

        result.push_row(*depart_epoch, row);
        if let Some(bar) = &progress {
            bar.inc(1);
        }
    }
    if let Some(bar) = progress {
        bar.finish();
    }
    Ok(result)
}

/// Solves every configured transfer type for one (depart, arrive) cell and
/// keeps the minimum-C3 candidate. A Lambert or arrival-ephemeris failure
/// degrades this single cell to `None` without aborting the sweep (spec
/// §4.4: "failures in individual cells are logged but non-fatal").
fn best_cell_for_pair(
    ephemeris: &dyn EphemerisProvider,
    request: &PcpRequest,
    r_depart: nalgebra::Vector3<f64>,
    v_depart_body: nalgebra::Vector3<f64>,
    depart_epoch: Epoch,
    arrive_epoch: Epoch,
) -> Option<PCPCell> {
    let (r_arrive, v_arrive_body) = match ephemeris.helio_state(request.arrival_body, arrive_epoch) {
        Ok(state) => state,
        Err(e) => {
            log::debug!("PCP cell skipped, arrival ephemeris unavailable: {}", e);
            return None;
        }
    };
    let dt = (arrive_epoch - depart_epoch).to_seconds();

    let mut best: Option<PCPCell> = None;
    for transfer_type in request.transfer_types {
        let sol = match lambert::solve(r_depart, r_arrive, dt, SUN_GM, *transfer_type, None) {
            Ok(s) => s,
            Err(e) => {
                log::debug!("PCP cell Lambert failure ({:?}): {}", transfer_type, e);
                continue;
            }
        };
        let vinf_departure_vec = sol.v_depart - v_depart_body;
        let vinf_arrival_vec = sol.v_arrive - v_arrive_body;
        let candidate = PCPCell {
            c3: vinf_departure_vec.norm_squared(),
            vinf_arrival_scalar: vinf_arrival_vec.norm(),
            vinf_departure_scalar: vinf_departure_vec.norm(),
            vinf_departure_vec,
            vinf_arrival_vec,
        };
        best = match best {
            Some(current) if current.c3 <= candidate.c3 => Some(current),
            _ => Some(candidate),
        };
    }
    best
}

/// The heliocentric gravitational parameter used to convert a Lambert
/// solution's departure velocity into C3; the PCP generator always
/// transfers about the Sun (interplanetary legs), matching spec §4.4/§4.5's
/// launch -> flyby -> arrival chain.
pub(crate) const SUN_GM: f64 = 1.327_124_400_18e11;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosmic::body::lookup;
    use crate::cosmic::orbit::Orbit;
    use crate::cosmic::ephemeris::AnalyticTwoBodyEphemeris;
    use hifitime::Epoch;

    #[test]
    fn sweep_window_steps_inclusive_of_endpoints() {
        let from = Epoch::from_gregorian_utc_at_midnight(2020, 1, 1);
        let until = from + 3.0.days();
        let window = SweepWindow { from, until, resolution_days: 1.0 };
        assert_eq!(window.epochs().len(), 4);
    }

    #[test]
    fn generate_produces_a_row_per_depart_epoch() {
        let sun = lookup("Sun").unwrap();
        let epoch0 = Epoch::from_gregorian_utc_at_midnight(2020, 1, 1);
        let earth_orbit = Orbit::from_oe(149_598_023.0, 0.0167, 0.0, 0.0, 102.9f64.to_radians(), 0.0, epoch0, sun);
        let mars_orbit = Orbit::from_oe(227_939_200.0, 0.0934, 1.85f64.to_radians(), 49.6f64.to_radians(), 286.5f64.to_radians(), 19.4f64.to_radians(), epoch0, sun);
        let ephem = AnalyticTwoBodyEphemeris::new()
            .with_body("Earth", earth_orbit)
            .with_body("Mars", mars_orbit);

        let depart_window = SweepWindow {
            from: epoch0,
            until: epoch0 + 2.0.days(),
            resolution_days: 1.0,
        };
        let arrive_window = SweepWindow {
            from: epoch0 + 150.0.days(),
            until: epoch0 + 152.0.days(),
            resolution_days: 1.0,
        };
        let request = PcpRequest {
            launch_body: "Earth",
            arrival_body: "Mars",
            depart_window,
            arrive_window,
            transfer_types: &[TransferType::Type1],
            verbose: false,
        };
        let result = generate(&request, &ephem).unwrap();
        assert_eq!(result.rows.len(), 3);
        assert_eq!(result.arrive_offsets_days.len(), 3);
    }
}
