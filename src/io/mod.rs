/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! Result sinks (§6 CSV layouts) and the typed scenario-configuration
//! surface consumed, not parsed, by this crate.

/// CSV result sinks: trajectories, residuals, estimates, measurement files.
pub mod csv;
pub use self::csv::*;

/// The typed scenario-configuration document surface.
pub mod config;
pub use self::config::*;
