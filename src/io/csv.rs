/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! CSV result sinks (spec §6): trajectories, residuals, estimates, and
//! measurement files, in the exact column layouts the spec names.

use crate::errors::{AstroError, AstroResult};
use crate::md::trajectory::Trajectory;
use crate::od::EstimatorOutput;
use hifitime::Epoch;
use std::path::Path;

fn io_err(context: &str, e: impl std::fmt::Display) -> AstroError {
    AstroError::Io(format!("{context}: {e}"))
}

/// Writes a porkchop/GA-PCP trajectory set (spec §6): header
/// `launch,c3,rla,dla,<per-flyby: DT,DV,Rp,Bt,Br[,Phi]>,arrival,vInf`. The
/// per-flyby column group width is determined by the longest trajectory in
/// `trajectories`; shorter rows leave the trailing flyby columns blank.
pub fn write_trajectories(path: impl AsRef<Path>, trajectories: &[Trajectory]) -> AstroResult<()> {
    let max_flybys = trajectories.iter().map(|t| t.flybys.len()).max().unwrap_or(0);
    let mut writer = csv::Writer::from_path(path.as_ref()).map_err(|e| io_err("opening trajectory CSV", e))?;

    let mut header = vec!["launch".to_string(), "c3".to_string(), "rla".to_string(), "dla".to_string()];
    for i in 0..max_flybys {
        header.push(format!("DT{i}"));
        header.push(format!("DV{i}"));
        header.push(format!("Rp{i}"));
        header.push(format!("Bt{i}"));
        header.push(format!("Br{i}"));
        header.push(format!("Phi{i}"));
    }
    header.push("arrival".to_string());
    header.push("vInf".to_string());
    writer.write_record(&header).map_err(|e| io_err("writing trajectory header", e))?;

    for trajectory in trajectories {
        let mut row = vec![
            trajectory.launch_epoch.to_string(),
            trajectory.launch_c3.to_string(),
            trajectory.launch_rla.to_string(),
            trajectory.launch_dla.to_string(),
        ];
        for i in 0..max_flybys {
            match trajectory.flybys.get(i) {
                Some(f) => {
                    row.push(f.body_closest_approach_epoch.to_string());
                    row.push(f.delta_v.to_string());
                    row.push(f.periapsis_radius.to_string());
                    row.push(f.b_dot_t.to_string());
                    row.push(f.b_dot_r.to_string());
                    row.push(f.resonance_phase.map(|p| p.to_string()).unwrap_or_default());
                }
                None => row.extend(std::iter::repeat(String::new()).take(6)),
            }
        }
        row.push(trajectory.arrival_epoch.to_string());
        row.push(trajectory.arrival_vinf.to_string());
        writer.write_record(&row).map_err(|e| io_err("writing trajectory row", e))?;
    }

    writer.flush().map_err(|e| io_err("flushing trajectory CSV", e))
}

/// Writes filter residuals (spec §6): header `rho,rhoDot`.
pub fn write_residuals(path: impl AsRef<Path>, residuals: &[(f64, f64)]) -> AstroResult<()> {
    let mut writer = csv::Writer::from_path(path.as_ref()).map_err(|e| io_err("opening residuals CSV", e))?;
    writer.write_record(["rho", "rhoDot"]).map_err(|e| io_err("writing residuals header", e))?;
    for (rho, rho_dot) in residuals {
        writer
            .write_record([rho.to_string(), rho_dot.to_string()])
            .map_err(|e| io_err("writing residuals row", e))?;
    }
    writer.flush().map_err(|e| io_err("flushing residuals CSV", e))
}

/// Writes estimator output (spec §6): a custom header of epoch, elapsed
/// seconds/minutes/hours/days since `reference_epoch`, then the state
/// components (named `x0..xN-1`, since the state size is generic over 6/7).
pub fn write_estimates(path: impl AsRef<Path>, reference_epoch: Epoch, outputs: &[EstimatorOutput]) -> AstroResult<()> {
    let mut writer = csv::Writer::from_path(path.as_ref()).map_err(|e| io_err("opening estimates CSV", e))?;

    let state_size = outputs.first().map(|o| o.x.len()).unwrap_or(6);
    let mut header = vec![
        "epoch".to_string(),
        "elapsed_s".to_string(),
        "elapsed_min".to_string(),
        "elapsed_h".to_string(),
        "elapsed_d".to_string(),
    ];
    for i in 0..state_size {
        header.push(format!("x{i}"));
    }
    writer.write_record(&header).map_err(|e| io_err("writing estimates header", e))?;

    for output in outputs {
        let elapsed_s = (output.epoch - reference_epoch).to_seconds();
        let mut row = vec![
            output.epoch.to_string(),
            elapsed_s.to_string(),
            (elapsed_s / 60.0).to_string(),
            (elapsed_s / 3600.0).to_string(),
            (elapsed_s / 86400.0).to_string(),
        ];
        for v in output.x.iter() {
            row.push(v.to_string());
        }
        writer.write_record(&row).map_err(|e| io_err("writing estimates row", e))?;
    }

    writer.flush().map_err(|e| io_err("flushing estimates CSV", e))
}

/// One parsed/written row of a measurement file (spec §6):
/// `"station","epoch UTC",JD,ThetaGST,range,range_rate`. This is a plain
/// data row, not a [`crate::od::MeasurementRecord`] — resolving `station`
/// into a full [`crate::od::Station`] is the caller's job.
#[derive(Debug, Clone)]
pub struct MeasurementRow {
    pub station: String,
    pub epoch: Epoch,
    pub jd: f64,
    pub theta_gst_rad: f64,
    pub range_km: f64,
    pub range_rate_km_s: f64,
}

pub fn write_measurements(path: impl AsRef<Path>, rows: &[MeasurementRow]) -> AstroResult<()> {
    let mut writer = csv::Writer::from_path(path.as_ref()).map_err(|e| io_err("opening measurement CSV", e))?;
    writer
        .write_record(["station", "epoch UTC", "JD", "ThetaGST", "range", "range_rate"])
        .map_err(|e| io_err("writing measurement header", e))?;
    for row in rows {
        writer
            .write_record([
                row.station.clone(),
                row.epoch.to_string(),
                row.jd.to_string(),
                row.theta_gst_rad.to_string(),
                row.range_km.to_string(),
                row.range_rate_km_s.to_string(),
            ])
            .map_err(|e| io_err("writing measurement row", e))?;
    }
    writer.flush().map_err(|e| io_err("flushing measurement CSV", e))
}

/// Reads a measurement file back (spec §6). The epoch column is ignored in
/// favor of the JD column, which is authoritative for round-tripping.
pub fn read_measurements(path: impl AsRef<Path>) -> AstroResult<Vec<MeasurementRow>> {
    let mut reader = csv::Reader::from_path(path.as_ref()).map_err(|e| io_err("opening measurement CSV", e))?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| io_err("reading measurement row", e))?;
        if record.len() < 6 {
            return Err(AstroError::Io("measurement row has fewer than 6 columns".into()));
        }
        let jd: f64 = record[2].parse().map_err(|e| io_err("parsing JD column", e))?;
        rows.push(MeasurementRow {
            station: record[0].to_string(),
            epoch: Epoch::from_jde_utc(jd),
            jd,
            theta_gst_rad: record[3].parse().map_err(|e| io_err("parsing ThetaGST column", e))?,
            range_km: record[4].parse().map_err(|e| io_err("parsing range column", e))?,
            range_rate_km_s: record[5].parse().map_err(|e| io_err("parsing range_rate column", e))?,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, DVector};
    use tempfile::NamedTempFile;

    #[test]
    fn residuals_round_trip_through_csv() {
        let file = NamedTempFile::new().unwrap();
        write_residuals(file.path(), &[(1.2, -0.3), (0.5, 0.1)]).unwrap();
        let contents = std::fs::read_to_string(file.path()).unwrap();
        assert!(contents.starts_with("rho,rhoDot\n"));
        assert_eq!(contents.lines().count(), 3);
    }

    #[test]
    fn measurement_rows_round_trip() {
        let file = NamedTempFile::new().unwrap();
        let epoch = Epoch::from_gregorian_utc_at_midnight(2020, 1, 1);
        let rows = vec![MeasurementRow {
            station: "DSS-13".into(),
            epoch,
            jd: epoch.to_jde_utc_days(),
            theta_gst_rad: 1.234,
            range_km: 12345.6,
            range_rate_km_s: -1.2,
        }];
        write_measurements(file.path(), &rows).unwrap();
        let read_back = read_measurements(file.path()).unwrap();
        assert_eq!(read_back.len(), 1);
        assert_eq!(read_back[0].station, "DSS-13");
        assert!((read_back[0].range_km - 12345.6).abs() < 1e-9);
    }

    #[test]
    fn estimates_header_matches_state_size() {
        let file = NamedTempFile::new().unwrap();
        let epoch = Epoch::from_gregorian_utc_at_midnight(2020, 1, 1);
        let outputs = vec![EstimatorOutput {
            epoch: epoch + 10.0.seconds(),
            x: DVector::zeros(6),
            p: DMatrix::identity(6, 6),
            prefit: None,
            postfit: None,
        }];
        write_estimates(file.path(), epoch, &outputs).unwrap();
        let contents = std::fs::read_to_string(file.path()).unwrap();
        let header = contents.lines().next().unwrap();
        assert_eq!(header.split(',').count(), 5 + 6);
    }
}
