/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! The mission orchestrator (spec §4.1, §9): walks a spacecraft's waypoint
//! list in order, stepping the propagator forward and checking each active
//! waypoint's completion predicate, firing its action exactly once, then
//! activating the next waypoint. Continuous low-thrust control laws are
//! realized as a small instantaneous maneuver applied at every orchestrator
//! tick rather than folded into the EOM, mirroring the teacher's treatment
//! of thrust control as a per-step maneuver rather than a continuous force
//! term.

use crate::cosmic::body::CelestialBody;
use crate::cosmic::ephemeris::EphemerisProvider;
use crate::cosmic::spacecraft::{Action, Spacecraft};
use crate::dynamics::thrustctrl::ControlLawSet;
use crate::errors::{AstroError, AstroResult};
use crate::propagators::Propagator;
use hifitime::{Epoch, TimeUnitHelper};

/// Drives a [`Propagator`] through a [`Spacecraft`]'s waypoint list (spec
/// §4.1). The orchestrator owns the tick size and the waypoint index; the
/// propagator and spacecraft remain independent, ownership-free values
/// (spec §9: no cyclic references between mission, spacecraft, and
/// propagator).
pub struct Mission {
    pub propagator: Propagator,
    tick_s: f64,
    waypoint_idx: usize,
    active_since: Option<Epoch>,
}

impl Mission {
    pub fn new(propagator: Propagator, tick_s: f64) -> Self {
        Self {
            propagator,
            tick_s,
            waypoint_idx: 0,
            active_since: None,
        }
    }

    /// Runs the mission until every waypoint has cleared or `max_epoch` is
    /// reached, whichever comes first. `ephemeris` is only consulted when a
    /// cleared waypoint's action is `SwitchFrame`; a mission with no such
    /// action never touches it.
    pub fn run(
        &mut self,
        spacecraft: &mut Spacecraft,
        ephemeris: &dyn EphemerisProvider,
        max_epoch: Epoch,
    ) -> AstroResult<()> {
        if spacecraft.waypoints.is_empty() {
            return Ok(());
        }
        spacecraft.waypoints[0].activate();
        self.active_since = Some(self.propagator.current_state().epoch);

        while self.waypoint_idx < spacecraft.waypoints.len() {
            if self.propagator.current_state().epoch >= max_epoch {
                return Err(AstroError::Config(
                    "mission did not clear all waypoints before max_epoch".into(),
                ));
            }

            if let Some(control) = self.active_control_law(spacecraft) {
                self.apply_control_tick(spacecraft, &control)?;
            }

            let target = (self.propagator.current_state().epoch + self.tick_s.seconds()).min(max_epoch);
            let state = self.propagator.propagate_to(target, spacecraft)?;

            let elapsed = (state.epoch - self.active_since.unwrap_or(state.epoch)).to_seconds();
            let cleared_action = spacecraft.waypoints[self.waypoint_idx].advance(&state.orbit, elapsed);
            if let Some(action) = cleared_action {
                self.apply_action(&action, spacecraft, ephemeris)?;
                self.waypoint_idx += 1;
                if let Some(next) = spacecraft.waypoints.get_mut(self.waypoint_idx) {
                    next.activate();
                    self.active_since = Some(state.epoch);
                }
            }
        }
        Ok(())
    }

    fn active_control_law(&self, spacecraft: &Spacecraft) -> Option<ControlLawSet> {
        match &spacecraft.waypoints.get(self.waypoint_idx)?.kind {
            crate::cosmic::spacecraft::WaypointKind::OrbitTarget { control_law_set, .. } => {
                Some(control_law_set.clone())
            }
            _ => None,
        }
    }

    /// Approximates a continuous control law as a small instantaneous
    /// delta-v applied over this tick, scaled by the thruster's
    /// acceleration and the tick duration (spec §4.2: control laws produce
    /// a thrust direction; integrating it over one tick as an impulsive
    /// maneuver keeps the EOM free of a continuous control term).
    fn apply_control_tick(&mut self, spacecraft: &mut Spacecraft, control: &ControlLawSet) -> AstroResult<()> {
        let Some(thruster) = spacecraft.thruster_table.first() else {
            return Ok(());
        };
        let state = self.propagator.current_state();
        let accel_km_s2 = thruster.thrust_n / spacecraft.total_mass_kg() / 1000.0;
        let direction = control.control(&state.orbit);
        let dv_inertial = direction * accel_km_s2 * self.tick_s;

        let epoch = state.epoch;
        let (r, v) = state.orbit.rv();
        let rnc_to_inertial = crate::propagators::rnc_rotation(r, v);
        let dv_rnc = rnc_to_inertial.transpose() * dv_inertial;
        spacecraft.schedule_maneuver(epoch, dv_rnc);
        Ok(())
    }

    fn apply_action(
        &mut self,
        action: &Action,
        spacecraft: &mut Spacecraft,
        ephemeris: &dyn EphemerisProvider,
    ) -> AstroResult<()> {
        match action {
            Action::AddCargo(mass_kg) => {
                spacecraft.dry_mass_kg += mass_kg;
            }
            Action::DropCargo(mass_kg) => {
                spacecraft.dry_mass_kg = (spacecraft.dry_mass_kg - mass_kg).max(0.0);
            }
            Action::SwitchFrame(target_body) => {
                self.propagator.reframe(*target_body, ephemeris)?;
            }
        }
        Ok(())
    }

    pub fn waypoint_index(&self) -> usize {
        self.waypoint_idx
    }

    pub fn central_body(&self) -> CelestialBody {
        self.propagator.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosmic::body::lookup;
    use crate::cosmic::ephemeris::AnalyticTwoBodyEphemeris;
    use crate::cosmic::orbit::Orbit;
    use crate::cosmic::spacecraft::{Spacecraft, SpacecraftState, Waypoint, WaypointKind};
    use crate::dynamics::perturbations::Perturbations;
    use crate::propagators::PropOpts;

    fn earth_circular_state(epoch: Epoch) -> SpacecraftState {
        let earth = lookup("Earth").unwrap();
        let orbit = Orbit::from_oe(7000.0, 0.001, 28.5f64.to_radians(), 0.0, 0.0, 0.0, epoch, earth);
        SpacecraftState::new(epoch, orbit, 500.0)
    }

    #[test]
    fn mission_with_no_waypoints_is_a_no_op() {
        let epoch = Epoch::from_gregorian_utc_at_midnight(2020, 1, 1);
        let earth = lookup("Earth").unwrap();
        let propagator = Propagator::new(earth_circular_state(epoch), earth, Perturbations::default(), PropOpts::default());
        let mut mission = Mission::new(propagator, 60.0);
        let mut spacecraft = Spacecraft::new(450.0, 50.0);
        let ephem = AnalyticTwoBodyEphemeris::new();
        mission.run(&mut spacecraft, &ephem, epoch + 10.0.seconds()).unwrap();
        assert_eq!(mission.waypoint_index(), 0);
    }

    #[test]
    fn mission_clears_a_reach_distance_waypoint() {
        let epoch = Epoch::from_gregorian_utc_at_midnight(2020, 1, 1);
        let earth = lookup("Earth").unwrap();
        let propagator = Propagator::new(earth_circular_state(epoch), earth, Perturbations::default(), PropOpts::default());
        let mut mission = Mission::new(propagator, 120.0);
        let mut spacecraft = Spacecraft::new(450.0, 50.0);
        spacecraft
            .waypoints
            .push(Waypoint::new(WaypointKind::ReachDistance { radius: 6999.0, further: Some(true) }));
        let ephem = AnalyticTwoBodyEphemeris::new();
        mission.run(&mut spacecraft, &ephem, epoch + 7200.0.seconds()).unwrap();
        assert_eq!(mission.waypoint_index(), 1);
    }

    #[test]
    fn mission_errors_when_waypoints_never_clear_before_max_epoch() {
        let epoch = Epoch::from_gregorian_utc_at_midnight(2020, 1, 1);
        let earth = lookup("Earth").unwrap();
        let propagator = Propagator::new(earth_circular_state(epoch), earth, Perturbations::default(), PropOpts::default());
        let mut mission = Mission::new(propagator, 60.0);
        let mut spacecraft = Spacecraft::new(450.0, 50.0);
        spacecraft
            .waypoints
            .push(Waypoint::new(WaypointKind::Loiter { duration_s: 1e9 }));
        let ephem = AnalyticTwoBodyEphemeris::new();
        let result = mission.run(&mut spacecraft, &ephem, epoch + 120.0.seconds());
        assert!(result.is_err());
    }
}
