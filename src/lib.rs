/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//! An interplanetary mission-design and orbit-determination toolkit:
//! Keplerian orbit mechanics, perturbed propagation, Lambert-based mission
//! design and gravity-assist search, and sequential/batch orbit
//! determination, built on `nalgebra` and `hifitime`.

/// Celestial bodies, frames, orbit representation, ephemeris access, and
/// the spacecraft/waypoint/maneuver data model.
pub mod cosmic;

/// Equations of motion, perturbation models, and thrust control laws.
pub mod dynamics;

/// Fixed- and adaptive-step integrators driving a spacecraft's orbit
/// forward in time, with observer back-pressure and collision detection.
pub mod propagators;

/// Mission design: Lambert-arc transfers, porkchop-plot scanning,
/// gravity-assist search, B-plane targeting, and the mission orchestrator.
pub mod md;

/// Orbit determination: measurement/station modeling, the hybrid
/// CKF/EKF with state noise compensation, square-root information
/// filtering, batch least squares, and RTS smoothing.
pub mod od;

/// CSV result sinks and the typed scenario-configuration surface.
pub mod io;

/// The crate-wide error taxonomy and physical-warning log.
pub mod errors;
