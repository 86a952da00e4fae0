/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

/// Celestial body identity and physical constants.
pub mod body;
pub use self::body::*;

/// Frame conventions and the ecliptic/equatorial boundary rotation.
pub mod frame;
pub use self::frame::*;

/// The self-consistent Keplerian `Orbit` value.
pub mod orbit;
pub use self::orbit::*;

/// The external ephemeris collaborator interface and a memoizing session.
pub mod ephemeris;
pub use self::ephemeris::*;

/// Spacecraft, waypoints, and the per-step `SpacecraftState` snapshot.
pub mod spacecraft;
pub use self::spacecraft::*;
