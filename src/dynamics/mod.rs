/*
    Astrodynamics Suite
    Copyright (C) 2026 Astrodynamics Suite Contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

/// Perturbation models: Jn zonals, third-body, drag, injected state noise.
pub mod perturbations;
pub use self::perturbations::*;

/// Thrust control laws as a closed sum type (spec §9).
pub mod thrustctrl;
pub use self::thrustctrl::*;

/// The equations-of-motion driver combining two-body gravity with the
/// enabled perturbation models, optionally propagating the state transition
/// matrix alongside the state (spec §4.1).
pub mod eom;
pub use self::eom::*;
