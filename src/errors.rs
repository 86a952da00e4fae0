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

use thiserror::Error;

/// Crate-wide error taxonomy (spec §7).
///
/// `Infeasible` variants are recovered locally by callers (branch pruning in
/// GA-PCP, cell skipping in PCP); all other variants are meant to propagate.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AstroError {
    // --- Infeasible: prune the current cell/branch, log at debug ---
    #[error("Lambert solver did not converge in {iterations} iterations")]
    LambertNotConverged { iterations: u32 },

    #[error("Lambert problem is not physically consistent (imaginary transfer geometry)")]
    LambertGeometry,

    #[error("non-positive time of flight: {0} s")]
    NonPositiveTimeOfFlight(f64),

    #[error("degenerate position vector (zero radius)")]
    ZeroRadius,

    #[error("C3 of {actual} km^2/s^2 exceeds the allowed maximum of {max}")]
    C3Exceeded { actual: f64, max: f64 },

    #[error("periapsis radius of {actual} km is below the minimum of {min}")]
    PeriapsisTooLow { actual: f64, min: f64 },

    #[error("flyby delta-v of {actual} km/s exceeds the maximum of {max}")]
    DeltaVExceeded { actual: f64, max: f64 },

    #[error("arrival v-infinity of {actual} km/s exceeds the maximum of {max}")]
    VInfinityExceeded { actual: f64, max: f64 },

    #[error("ephemeris provider has no data for the requested body/epoch")]
    EphemerisUnavailable,

    // --- Numerical: fatal for the current estimator pass or propagation ---
    #[error("state transition matrix is singular and cannot be inverted")]
    SingularStm,

    #[error("covariance is no longer positive semi-definite after update")]
    NonPsdCovariance,

    #[error("NaN or infinite value encountered in {context}")]
    NotFinite { context: String },

    #[error("B-plane targeting Jacobian is singular")]
    SingularTargetingJacobian,

    #[error("B-plane targeter did not converge in {iterations} iterations")]
    TargeterNotConverged { iterations: u32 },

    #[error("wall-clock propagation budget of {max_seconds} s exceeded")]
    PropagationTimedOut { max_seconds: f64 },

    // --- Config: fatal at subsystem startup ---
    #[error("unknown celestial body: {0}")]
    UnknownBody(String),

    #[error("unknown filter type: {0}")]
    UnknownFilterType(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    // --- IO: fatal for the affected pass only ---
    #[error("I/O failure: {0}")]
    Io(String),

    // --- Structural/frame invariants ---
    #[error("cannot reframe an orbit onto its own central body")]
    ReframeToSelf,

    #[error("orbit is unbound (e >= 1) where a bound orbit was required")]
    UnboundOrbit,
}

impl AstroError {
    /// True for the subset of errors that represent a recoverable, local
    /// infeasibility (spec §7): callers prune the branch/cell and continue.
    pub fn is_infeasible(&self) -> bool {
        matches!(
            self,
            AstroError::LambertNotConverged { .. }
                | AstroError::LambertGeometry
                | AstroError::NonPositiveTimeOfFlight(_)
                | AstroError::ZeroRadius
                | AstroError::C3Exceeded { .. }
                | AstroError::PeriapsisTooLow { .. }
                | AstroError::DeltaVExceeded { .. }
                | AstroError::VInfinityExceeded { .. }
                | AstroError::EphemerisUnavailable
        )
    }
}

/// A physical-warning counter (spec §7): collision events, visibility
/// mismatches between truth and reference. These never abort a pass; they
/// are tallied and summarized at the end with an escalating severity.
#[derive(Debug, Clone, Default)]
pub struct WarningLog {
    pub collisions: u32,
    pub visibility_mismatches: u32,
    pub other: Vec<String>,
}

impl WarningLog {
    pub fn total(&self) -> u32 {
        self.collisions + self.visibility_mismatches + self.other.len() as u32
    }

    pub fn record_collision(&mut self) {
        self.collisions += 1;
        log::warn!("collision event: |R| fell below body radius");
    }

    pub fn record_visibility_mismatch(&mut self) {
        self.visibility_mismatches += 1;
        log::warn!("station visibility mismatch between truth and reference");
    }

    /// Summary line whose severity escalates if any warnings occurred.
    pub fn summary(&self) -> String {
        let total = self.total();
        if total == 0 {
            "no physical warnings recorded".to_string()
        } else {
            format!(
                "{} physical warning(s): {} collision(s), {} visibility mismatch(es)",
                total, self.collisions, self.visibility_mismatches
            )
        }
    }
}

pub type AstroResult<T> = Result<T, AstroError>;
