/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! Mission design: Lambert-arc transfers, porkchop-plot scanning,
//! gravity-assist search, B-plane targeting, and the mission orchestrator
//! (spec §4.3-§4.6).

/// Result types shared across the mission-design subsystem (`PCPResult`,
/// `GAResult`, `Trajectory`).
pub mod trajectory;
pub use self::trajectory::*;

/// The universal-variable Lambert solver and the two-body Kepler propagator.
pub mod lambert;
pub use self::lambert::{propagate_kepler, solve, LambertSolution, TransferType};

/// Porkchop (PCP) grid generation.
pub mod pcp;
pub use self::pcp::{generate, PcpRequest, SweepWindow};

/// B-plane computation and the finite-difference B-plane targeter.
pub mod bplane;
pub use self::bplane::{BPlaneFrame, BPlaneResult, BPlaneTarget, BPlaneTargeter};

/// The concurrent, recursive gravity-assist trajectory search (spec §4.5).
pub mod gapcp;
pub use self::gapcp::*;

/// The mission orchestrator: steps the propagator between waypoints,
/// dispatches maneuvers, and fires waypoint actions (spec §4.1, §9).
pub mod mission;
pub use self::mission::*;
