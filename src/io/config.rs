/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! The typed scenario-configuration *surface* (spec §6): structs deriving
//! `serde::Deserialize` for every section the hierarchical key-value
//! scenario document may carry (`general`, `launch`, `flyby.<planet>`,
//! `arrival`, `mission`, `orbit`, `perturbations`, `burns.<n>`,
//! `measurements`, `station.<name>`, `filter`, `SNC`, `EKF`, `CKF`, `SRIF`,
//! `variance`/`noise`/`covariance`, `error`).
//!
//! Parsing the document itself (TOML/YAML/whatever the scenario file format
//! is) is explicitly out of scope (spec §1, §6): a caller-supplied parser
//! hands us one of these structs directly, already deserialized. What lives
//! here is purely the typed shape plus the accessors that turn it into the
//! runtime values the rest of the crate consumes (`Epoch`, `CelestialBody`,
//! `Station`, `Perturbations`, `EkfConfig`, `SncConfig`, `SweepWindow`...).

use crate::cosmic::body::{lookup, CelestialBody};
use crate::cosmic::orbit::Orbit;
use crate::dynamics::perturbations::{OrbitNoiseConfig, Perturbations};
use crate::errors::{AstroError, AstroResult};
use crate::md::pcp::SweepWindow;
use crate::od::filter::EkfConfig;
use crate::od::snc::{SncConfig, SncFrame};
use crate::od::station::Station;
use hifitime::Epoch;
use serde::Deserialize;
use std::collections::BTreeMap;

/// A scenario date (spec §6): either a Julian Date float or a
/// `"YYYY-MM-DD HH:MM:SS"` UTC string. "Julian date takes precedence when
/// non-zero" — the zero JD sentinel means "use the text field instead".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateSpec {
    #[serde(default)]
    pub jd: f64,
    #[serde(default)]
    pub gregorian_utc: Option<String>,
}

impl DateSpec {
    /// Resolves to a concrete [`Epoch`] per spec §6's precedence rule.
    pub fn epoch(&self) -> AstroResult<Epoch> {
        if self.jd != 0.0 {
            return Ok(Epoch::from_jde_utc(self.jd));
        }
        let text = self
            .gregorian_utc
            .as_deref()
            .ok_or_else(|| AstroError::Config("date has neither a non-zero JD nor a gregorian_utc string".into()))?;
        parse_gregorian_utc(text)
    }
}

/// Parses `"YYYY-MM-DD HH:MM:SS"` UTC text into an [`Epoch`]. `hifitime`'s
/// `FromStr` expects an ISO-8601 `T` separator, not the space the spec's
/// wire format uses, so the separator is normalized before delegating.
fn parse_gregorian_utc(text: &str) -> AstroResult<Epoch> {
    let normalized = if let Some((date, time)) = text.trim().split_once(' ') {
        format!("{date}T{time}")
    } else {
        text.trim().to_string()
    };
    normalized
        .parse::<Epoch>()
        .map_err(|e| AstroError::Config(format!("unparseable date '{text}': {e}")))
}

/// `general` section: top-level run metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneralSection {
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub plot: bool,
    #[serde(default)]
    pub output_path: Option<String>,
}

/// `launch` section (spec §4.5 launch leg).
#[derive(Debug, Clone, Deserialize)]
pub struct LaunchSection {
    pub body: String,
    pub from: DateSpec,
    pub until: DateSpec,
    #[serde(default = "default_resolution_days")]
    pub resolution_days: f64,
    pub max_c3: f64,
}

fn default_resolution_days() -> f64 {
    1.0
}

/// One `flyby.<planet>` section (spec §4.5 flyby leg). The map key in
/// [`ScenarioConfig::flyby`] is the `<planet>` suffix; this struct carries
/// everything after it.
#[derive(Debug, Clone, Deserialize)]
pub struct FlybySection {
    pub body: String,
    pub from: DateSpec,
    pub until: DateSpec,
    #[serde(default = "default_resolution_days")]
    pub resolution_days: f64,
    #[serde(default)]
    pub max_delta_v: Option<f64>,
    #[serde(default)]
    pub min_periapsis_radius_factor: Option<f64>,
}

/// `arrival` section (spec §4.5 arrival leg).
#[derive(Debug, Clone, Deserialize)]
pub struct ArrivalSection {
    pub body: String,
    pub from: DateSpec,
    pub until: DateSpec,
    #[serde(default = "default_resolution_days")]
    pub resolution_days: f64,
    pub max_vinf: f64,
}

/// Shared accessor: resolves `{body, from, until, resolution_days}` into a
/// `(CelestialBody, SweepWindow)` pair used by `md::pcp`/`md::gapcp`.
fn resolve_window(body: &str, from: &DateSpec, until: &DateSpec, resolution_days: f64) -> AstroResult<(CelestialBody, SweepWindow)> {
    let celestial = lookup(body)?;
    let window = SweepWindow {
        from: from.epoch()?,
        until: until.epoch()?,
        resolution_days,
    };
    Ok((celestial, window))
}

impl LaunchSection {
    pub fn resolve(&self) -> AstroResult<(CelestialBody, SweepWindow)> {
        resolve_window(&self.body, &self.from, &self.until, self.resolution_days)
    }
}

impl FlybySection {
    pub fn resolve(&self) -> AstroResult<(CelestialBody, SweepWindow)> {
        resolve_window(&self.body, &self.from, &self.until, self.resolution_days)
    }
}

impl ArrivalSection {
    pub fn resolve(&self) -> AstroResult<(CelestialBody, SweepWindow)> {
        resolve_window(&self.body, &self.from, &self.until, self.resolution_days)
    }
}

/// `mission` section: the spacecraft's central body and starting epoch.
#[derive(Debug, Clone, Deserialize)]
pub struct MissionSection {
    pub central_body: String,
    pub start: DateSpec,
    #[serde(default)]
    pub dry_mass_kg: f64,
    #[serde(default)]
    pub fuel_mass_kg: f64,
}

/// `orbit` section: classical elements, degrees on the wire (spec §6's
/// scenario documents are human-authored), radians once resolved.
#[derive(Debug, Clone, Deserialize)]
pub struct OrbitSection {
    pub sma_km: f64,
    pub ecc: f64,
    pub inc_deg: f64,
    pub raan_deg: f64,
    pub argp_deg: f64,
    pub ta_deg: f64,
    pub central_body: String,
    pub epoch: DateSpec,
}

impl OrbitSection {
    pub fn resolve(&self) -> AstroResult<Orbit> {
        let central_body = lookup(&self.central_body)?;
        let epoch = self.epoch.epoch()?;
        Ok(Orbit::from_oe(
            self.sma_km,
            self.ecc,
            self.inc_deg.to_radians(),
            self.raan_deg.to_radians(),
            self.argp_deg.to_radians(),
            self.ta_deg.to_radians(),
            epoch,
            central_body,
        ))
    }
}

/// `perturbations` section (spec §3: Perturbations).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PerturbationsSection {
    #[serde(default)]
    pub jn_order: u8,
    #[serde(default)]
    pub third_body: Option<String>,
    #[serde(default)]
    pub drag_enabled: bool,
    #[serde(default)]
    pub noise_probability: Option<f64>,
    #[serde(default)]
    pub noise_sigma_position_km: Option<f64>,
    #[serde(default)]
    pub noise_sigma_velocity_km_s: Option<f64>,
}

impl PerturbationsSection {
    pub fn resolve(&self) -> AstroResult<Perturbations> {
        let third_body = self.third_body.as_deref().map(lookup).transpose()?;
        let noise = match (self.noise_probability, self.noise_sigma_position_km, self.noise_sigma_velocity_km_s) {
            (None, None, None) => None,
            (p, sp, sv) => Some(OrbitNoiseConfig {
                probability: p.unwrap_or(0.0),
                sigma_position_km: sp.unwrap_or(0.0),
                sigma_velocity_km_s: sv.unwrap_or(0.0),
            }),
        };
        Ok(Perturbations {
            jn_order: self.jn_order,
            third_body,
            drag_enabled: self.drag_enabled,
            noise,
        })
    }
}

/// One `burns.<n>` section: a scheduled impulsive maneuver, RNC frame, km/s.
#[derive(Debug, Clone, Deserialize)]
pub struct BurnSection {
    pub epoch: DateSpec,
    pub radial_km_s: f64,
    pub normal_km_s: f64,
    pub cross_km_s: f64,
}

/// `measurements` section: global measurement-run parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeasurementsSection {
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default = "default_step_s")]
    pub step_s: f64,
}

fn default_step_s() -> f64 {
    60.0
}

/// One `station.<name>` section (spec §3: Station).
#[derive(Debug, Clone, Deserialize)]
pub struct StationSection {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    #[serde(default)]
    pub altitude_km: f64,
    pub min_elevation_deg: f64,
    pub range_sigma_km: f64,
    pub range_rate_sigma_km_s: f64,
    #[serde(default)]
    pub planet: Option<String>,
}

impl StationSection {
    pub fn resolve(&self, name: &str) -> AstroResult<Station> {
        let planet = self.planet.as_deref().map(lookup).transpose()?;
        Ok(Station::new(
            name,
            self.latitude_deg,
            self.longitude_deg,
            self.altitude_km,
            self.min_elevation_deg,
            self.range_sigma_km,
            self.range_rate_sigma_km_s,
            planet,
        ))
    }
}

/// `EKF` section.
#[derive(Debug, Clone, Deserialize)]
pub struct EkfSection {
    pub trigger_count: u32,
    pub disable_dt_s: f64,
}

impl From<&EkfSection> for EkfConfig {
    fn from(s: &EkfSection) -> Self {
        EkfConfig {
            trigger_count: s.trigger_count,
            disable_dt_s: s.disable_dt_s,
        }
    }
}

/// `CKF` section: present only to let a scenario force classical-only mode
/// even when an `[EKF]` section is also supplied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CkfSection {
    #[serde(default)]
    pub force_classical: bool,
}

/// `SRIF` section: selects the information-form filter in place of the
/// hybrid CKF/EKF driver.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SrifSection {
    #[serde(default)]
    pub enabled: bool,
}

/// `SNC` section (spec §4.7: State Noise Compensation).
#[derive(Debug, Clone, Deserialize)]
pub struct SncSection {
    #[serde(default)]
    pub enabled: bool,
    pub dt_threshold_s: f64,
    pub sigma_accel_km_s2: f64,
    #[serde(default)]
    pub frame_ric: bool,
}

impl From<&SncSection> for SncConfig {
    fn from(s: &SncSection) -> Self {
        SncConfig {
            enabled: s.enabled,
            dt_threshold_s: s.dt_threshold_s,
            sigma_accel_km_s2: s.sigma_accel_km_s2,
            frame: if s.frame_ric { SncFrame::Ric } else { SncFrame::Inertial },
        }
    }
}

/// `variance` / `noise` / `covariance` / `error` sections: the filter's
/// initial-uncertainty and measurement-noise inputs, diagonal-only (the
/// scenario document names these as flat key lists, not full matrices).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VarianceSection {
    #[serde(default)]
    pub position_km2: f64,
    #[serde(default)]
    pub velocity_km2_s2: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoiseSection {
    #[serde(default)]
    pub range_km2: f64,
    #[serde(default)]
    pub range_rate_km2_s2: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CovarianceSection {
    #[serde(default)]
    pub diag_position_km2: f64,
    #[serde(default)]
    pub diag_velocity_km2_s2: f64,
}

/// `error` section: initial state-estimate perturbation used by scenarios
/// that seed a filter pass with a known truth/reference offset (spec §8
/// scenario 5).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorSection {
    #[serde(default)]
    pub delta_r_km: [f64; 3],
    #[serde(default)]
    pub delta_v_km_s: [f64; 3],
}

/// `filter` section: which estimator family to run plus its nested
/// sub-sections.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterSection {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub ekf: Option<EkfSection>,
    #[serde(default)]
    pub ckf: Option<CkfSection>,
    #[serde(default)]
    pub srif: Option<SrifSection>,
    #[serde(default)]
    pub snc: Option<SncSection>,
    #[serde(default)]
    pub variance: Option<VarianceSection>,
    #[serde(default)]
    pub noise: Option<NoiseSection>,
    #[serde(default)]
    pub covariance: Option<CovarianceSection>,
    #[serde(default)]
    pub error: Option<ErrorSection>,
}

/// The full scenario configuration document (spec §6). Every top-level
/// section is optional except `general`: a caller assembling one of these
/// for, say, a pure Lambert/PCP run need not populate `filter`/`station`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub general: GeneralSection,
    #[serde(default)]
    pub launch: Option<LaunchSection>,
    #[serde(default)]
    pub flyby: BTreeMap<String, FlybySection>,
    #[serde(default)]
    pub arrival: Option<ArrivalSection>,
    #[serde(default)]
    pub mission: Option<MissionSection>,
    #[serde(default)]
    pub orbit: Option<OrbitSection>,
    #[serde(default)]
    pub perturbations: Option<PerturbationsSection>,
    #[serde(default)]
    pub burns: BTreeMap<u32, BurnSection>,
    #[serde(default)]
    pub measurements: Option<MeasurementsSection>,
    #[serde(default)]
    pub station: BTreeMap<String, StationSection>,
    #[serde(default)]
    pub filter: Option<FilterSection>,
}

impl ScenarioConfig {
    /// Flyby legs in ascending-key order (the map key is the planet name
    /// used as the section suffix, not necessarily the flyby sequence
    /// order — callers that need a specific leg order should sort the
    /// returned pairs themselves; this just resolves what is parseable).
    pub fn resolved_stations(&self) -> AstroResult<Vec<Station>> {
        self.station.iter().map(|(name, section)| section.resolve(name)).collect()
    }
}
