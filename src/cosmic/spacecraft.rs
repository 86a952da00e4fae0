/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

use crate::cosmic::body::CelestialBody;
use crate::cosmic::orbit::Orbit;
use crate::dynamics::thrustctrl::ControlLawSet;
use hifitime::Epoch;
use nalgebra::Vector3;
use std::collections::BTreeMap;

/// A terminal action fired exactly once when a waypoint clears (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    AddCargo(f64),
    DropCargo(f64),
    SwitchFrame(CelestialBody),
}

/// The Waypoint sum type (spec §3). The orchestrator advances an index into
/// an ordered `Vec<Waypoint>` rather than following pointers (spec §9).
#[derive(Debug, Clone, PartialEq)]
pub enum WaypointKind {
    ReachDistance { radius: f64, further: Option<bool> },
    Loiter { duration_s: f64 },
    OrbitTarget { target_orbit: Orbit, control_law_set: ControlLawSet },
    HohmannTransfer { target: Orbit },
    ToHyperbolic,
    ToElliptical,
}

/// Lifecycle states of a [`Waypoint`]: pending -> active -> cleared, firing
/// its `Action` exactly once on the pending->cleared transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaypointStatus {
    Pending,
    Active,
    Cleared,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    pub kind: WaypointKind,
    pub action: Option<Action>,
    pub status: WaypointStatus,
}

impl Waypoint {
    pub fn new(kind: WaypointKind) -> Self {
        Self {
            kind,
            action: None,
            status: WaypointStatus::Pending,
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn activate(&mut self) {
        if self.status == WaypointStatus::Pending {
            self.status = WaypointStatus::Active;
        }
    }

    /// Evaluates the completion predicate for this waypoint's kind against
    /// the current orbit, and clears it (firing the action) if satisfied.
    /// Returns the action to fire, if any just fired.
    pub fn advance(&mut self, orbit: &Orbit, elapsed_since_active_s: f64) -> Option<Action> {
        if self.status != WaypointStatus::Active {
            return None;
        }
        let complete = match &self.kind {
            WaypointKind::ReachDistance { radius, further } => {
                let further = further.unwrap_or(true);
                if further {
                    orbit.rmag() >= *radius
                } else {
                    orbit.rmag() <= *radius
                }
            }
            WaypointKind::Loiter { duration_s } => elapsed_since_active_s >= *duration_s,
            WaypointKind::OrbitTarget { target_orbit, .. } => orbit.approx_eq(target_orbit),
            WaypointKind::HohmannTransfer { target } => orbit.approx_eq(target),
            WaypointKind::ToHyperbolic => orbit.ecc() >= 1.0,
            WaypointKind::ToElliptical => orbit.ecc() < 1.0,
        };
        if complete {
            self.status = WaypointStatus::Cleared;
            self.action.take()
        } else {
            None
        }
    }
}

/// A scheduled maneuver: an instantaneous delta-V expressed in the
/// radial/normal/cross (RNC) frame (spec §3), applied at `epoch`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledManeuver {
    pub epoch: Epoch,
    pub dv_rnc: Vector3<f64>,
}

/// Spacecraft (spec §3): dry/fuel mass, thruster table, waypoint list,
/// scheduled maneuvers. Fuel mass is monotonically non-increasing; the
/// spacecraft value itself stays a pure data record — the mission context
/// is never stored inside it (spec §9: cyclic references are broken by
/// keeping the context reference inside callbacks, not inside the
/// spacecraft).
#[derive(Debug, Clone)]
pub struct Spacecraft {
    pub dry_mass_kg: f64,
    pub fuel_mass_kg: f64,
    pub thruster_table: Vec<Thruster>,
    pub waypoints: Vec<Waypoint>,
    pub maneuvers: BTreeMap<i64, ScheduledManeuver>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thruster {
    pub name: &'static str,
    pub thrust_n: f64,
    pub isp_s: f64,
}

impl Spacecraft {
    pub fn new(dry_mass_kg: f64, fuel_mass_kg: f64) -> Self {
        Self {
            dry_mass_kg,
            fuel_mass_kg,
            thruster_table: Vec::new(),
            waypoints: Vec::new(),
            maneuvers: BTreeMap::new(),
        }
    }

    pub fn total_mass_kg(&self) -> f64 {
        self.dry_mass_kg + self.fuel_mass_kg
    }

    pub fn schedule_maneuver(&mut self, epoch: Epoch, dv_rnc: Vector3<f64>) {
        self.maneuvers
            .insert(epoch.to_tai_seconds().round() as i64, ScheduledManeuver { epoch, dv_rnc });
    }

    /// Consumes fuel mass for a delta-v magnitude using the Tsiolkovsky
    /// rocket equation with the given thruster's Isp. Never returns a fuel
    /// mass below zero (monotonically non-increasing invariant).
    pub fn consume_fuel(&mut self, dv_mag_km_s: f64, isp_s: f64) {
        const G0: f64 = 9.80665e-3; // km/s^2
        let m0 = self.total_mass_kg();
        let m1 = m0 * (-dv_mag_km_s / (isp_s * G0)).exp();
        let burned = (m0 - m1).max(0.0);
        self.fuel_mass_kg = (self.fuel_mass_kg - burned).max(0.0);
    }
}

/// An integrator-observable snapshot (spec §3: State): epoch, owning
/// spacecraft, current orbit, current STM, current mass. Emitted on every
/// integrator step.
#[derive(Debug, Clone)]
pub struct SpacecraftState {
    pub epoch: Epoch,
    pub orbit: Orbit,
    pub stm: nalgebra::Matrix6<f64>,
    pub mass_kg: f64,
}

impl SpacecraftState {
    pub fn new(epoch: Epoch, orbit: Orbit, mass_kg: f64) -> Self {
        Self {
            epoch,
            orbit,
            stm: nalgebra::Matrix6::identity(),
            mass_kg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuel_mass_never_goes_negative() {
        let mut sc = Spacecraft::new(500.0, 1.0);
        sc.consume_fuel(50.0, 300.0);
        assert!(sc.fuel_mass_kg >= 0.0);
    }

    #[test]
    fn waypoint_fires_action_exactly_once() {
        let mut wp = Waypoint::new(WaypointKind::ReachDistance { radius: 7000.0, further: Some(true) })
            .with_action(Action::AddCargo(10.0));
        wp.activate();

        let epoch = Epoch::from_gregorian_utc_at_midnight(2020, 1, 1);
        let sun = crate::cosmic::body::lookup("Sun").unwrap();
        let below = Orbit::from_oe(6000.0, 0.0, 0.0, 0.0, 0.0, 0.0, epoch, sun);
        assert!(wp.advance(&below, 0.0).is_none());

        let above = Orbit::from_oe(8000.0, 0.0, 0.0, 0.0, 0.0, 0.0, epoch, sun);
        assert_eq!(wp.advance(&above, 0.0), Some(Action::AddCargo(10.0)));
        assert_eq!(wp.status, WaypointStatus::Cleared);
        // Advancing a cleared waypoint never fires again.
        assert_eq!(wp.advance(&above, 0.0), None);
    }
}
