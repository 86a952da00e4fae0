/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

use crate::cosmic::body::CelestialBody;
use crate::dynamics::perturbations::{central_difference_jacobian, Perturbations};
use nalgebra::{Matrix3, Matrix6, SVector, Vector3, Vector6};

/// A third body's instantaneous position (km, relative to the same central
/// body as the propagated state) and gravitational parameter, used for the
/// EOM's third-body term (spec §4.1).
#[derive(Debug, Clone, Copy)]
pub struct ThirdBody {
    pub gm: f64,
    pub position_km: Vector3<f64>,
}

/// Size of the state-only propagation vector: (R, V).
pub const STATE_SIZE: usize = 6;
/// Size of the state-plus-STM propagation vector: (R, V, vec(Phi)).
pub const STATE_STM_SIZE: usize = 42;

pub fn two_body_acceleration(r: Vector3<f64>, mu: f64) -> Vector3<f64> {
    -mu * r / r.norm().powi(3)
}

/// Analytic partial of the two-body acceleration with respect to position:
/// d/dR(-mu R / |R|^3) = -mu/|R|^3 I + 3 mu (R R^T) / |R|^5.
pub fn two_body_gradient(r: Vector3<f64>, mu: f64) -> Matrix3<f64> {
    let rmag = r.norm();
    Matrix3::identity() * (-mu / rmag.powi(3)) + (r * r.transpose()) * (3.0 * mu / rmag.powi(5))
}

/// Six-dimensional equations of motion: two-body gravity plus every enabled
/// perturbation term (spec §4.1 EOM). `drag_bc_inv` is the spacecraft's
/// ballistic coefficient inverse (m^2/kg); `None` disables the drag term
/// regardless of `perturbations.drag_enabled`.
pub fn eom_rv(
    state: &Vector6<f64>,
    body: &CelestialBody,
    perturbations: &Perturbations,
    third_bodies: &[ThirdBody],
    drag_bc_inv: Option<f64>,
) -> Vector6<f64> {
    let r = state.fixed_rows::<3>(0).into_owned();
    let v = state.fixed_rows::<3>(3).into_owned();
    let mut a = two_body_acceleration(r, body.gm);
    a += perturbations.jn_acceleration(r, body);
    for tb in third_bodies {
        a += perturbations.third_body_acceleration(r, tb.position_km, tb.gm);
    }
    if let Some(bc_inv) = drag_bc_inv {
        a += perturbations.drag_acceleration(r, v, body, bc_inv);
    }
    Vector6::new(v.x, v.y, v.z, a.x, a.y, a.z)
}

/// Forty-two-dimensional equations of motion, carrying the flattened STM
/// alongside the state (spec §4.1). The two-body and Jn<=4 partials are
/// analytic; third-body and drag partials fall back to the crate's
/// central-difference helper, which the spec permits provided the relative
/// error stays within 1e-6 per element.
pub fn eom_rv_stm(
    state: &SVector<f64, STATE_STM_SIZE>,
    body: &CelestialBody,
    perturbations: &Perturbations,
    third_bodies: &[ThirdBody],
    drag_bc_inv: Option<f64>,
) -> SVector<f64, STATE_STM_SIZE> {
    let rv = extract_rv(state);
    let phi = extract_stm(state);
    let r = rv.fixed_rows::<3>(0).into_owned();
    let v = rv.fixed_rows::<3>(3).into_owned();

    let d_rv = eom_rv(&rv, body, perturbations, third_bodies, drag_bc_inv);

    let mut dadr = two_body_gradient(r, body.gm);
    if perturbations.jn_order > 0 {
        dadr += perturbations.jn_partial(r, body);
    }
    for tb in third_bodies {
        dadr += central_difference_jacobian(r, |r| {
            perturbations.third_body_acceleration(r, tb.position_km, tb.gm)
        });
    }
    let mut dadv = Matrix3::zeros();
    if let Some(bc_inv) = drag_bc_inv {
        dadr += central_difference_jacobian(r, |r| {
            perturbations.drag_acceleration(r, v, body, bc_inv)
        });
        // Drag acceleration depends on velocity (through the relative
        // velocity squared), so the variational equation needs d(a_drag)/dV
        // too, not just d(a_drag)/dR.
        dadv += central_difference_jacobian(v, |v| {
            perturbations.drag_acceleration(r, v, body, bc_inv)
        });
    }

    let mut a_matrix = Matrix6::zeros();
    for i in 0..3 {
        a_matrix[(i, i + 3)] = 1.0;
    }
    for i in 0..3 {
        for j in 0..3 {
            a_matrix[(i + 3, j)] = dadr[(i, j)];
            a_matrix[(i + 3, j + 3)] = dadv[(i, j)];
        }
    }
    let dphi = a_matrix * phi;

    pack(d_rv, dphi)
}

pub fn identity_stm_state(rv: Vector6<f64>) -> SVector<f64, STATE_STM_SIZE> {
    pack(rv, Matrix6::identity())
}

pub fn extract_rv(state: &SVector<f64, STATE_STM_SIZE>) -> Vector6<f64> {
    state.fixed_rows::<6>(0).into_owned()
}

pub fn extract_stm(state: &SVector<f64, STATE_STM_SIZE>) -> Matrix6<f64> {
    let flat = state.fixed_rows::<36>(6).into_owned();
    let mut m = Matrix6::zeros();
    for i in 0..6 {
        for j in 0..6 {
            m[(i, j)] = flat[i * 6 + j];
        }
    }
    m
}

fn pack(rv: Vector6<f64>, stm: Matrix6<f64>) -> SVector<f64, STATE_STM_SIZE> {
    let mut flat = SVector::<f64, 36>::zeros();
    for i in 0..6 {
        for j in 0..6 {
            flat[i * 6 + j] = stm[(i, j)];
        }
    }
    let mut out = SVector::<f64, STATE_STM_SIZE>::zeros();
    out.fixed_rows_mut::<6>(0).copy_from(&rv);
    out.fixed_rows_mut::<36>(6).copy_from(&flat);
    out
}
