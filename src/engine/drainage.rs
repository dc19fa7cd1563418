use crate::base::{ParamDrainage, DRAIN_D_PSI, MM_PER_DAY_TO_CM_PER_H};
use crate::StrError;

/// Implements the Hooghoudt steady-state flux into parallel subsurface drains
///
/// ```text
/// q = (8 Ke de m + 4 Ke m²) / L²
/// ```
///
/// where `m` is the water-table height above the drains, `L` the drain
/// spacing, `Ke` the lateral conductivity, and `de` the effective depth
/// correction accounting for radial flow resistance near the drains.
pub struct Drainage {
    /// Lateral saturated conductivity (cm/h)
    ke: f64,

    /// Drain spacing (cm)
    spacing: f64,

    /// Effective depth to the impermeable layer (cm)
    de: f64,
}

impl Drainage {
    /// Allocates a new instance, precomputing the effective depth
    ///
    /// The correction has three regimes in the ratio of depth-to-impermeable
    /// over spacing: negligible (no correction), transitional (Moody), and
    /// deep (spacing-controlled).
    pub fn new(param: &ParamDrainage) -> Result<Self, StrError> {
        if param.drain_spacing <= 0.0 || param.drain_radius <= 0.0 {
            return Err("drain spacing and radius must be positive");
        }
        if param.imperm_depth < param.drain_depth {
            return Err("the impermeable layer must lie below the drains");
        }
        if param.klat <= 0.0 {
            return Err("the lateral conductivity must be positive");
        }
        let dd = param.imperm_depth - param.drain_depth; // drain to impermeable layer
        let ll = param.drain_spacing;
        let ratio = dd / ll;
        let de = if ratio < 1e-3 {
            dd
        } else if ratio < 0.3 {
            dd / (1.0 + ratio * ((8.0 / std::f64::consts::PI) * f64::ln(dd / param.drain_radius) - 3.4))
        } else {
            ll * std::f64::consts::PI / (8.0 * (f64::ln(ll / param.drain_radius) - 1.15))
        };
        Ok(Drainage {
            ke: param.klat / MM_PER_DAY_TO_CM_PER_H,
            spacing: ll,
            de,
        })
    }

    /// Returns the drain flux (cm/h) given the potential at the drain depth
    ///
    /// The water-table height above the drains is the positive part of the
    /// potential; a dry drain node yields zero flux.
    pub fn flux(&self, psi_drain: f64) -> f64 {
        let m = f64::max(psi_drain, 0.0);
        if m == 0.0 {
            return 0.0;
        }
        (8.0 * self.ke * self.de * m + 4.0 * self.ke * m * m) / (self.spacing * self.spacing)
    }

    /// Returns the derivative of the flux with respect to the potential
    /// (finite difference, for the Jacobian assembly)
    pub fn d_flux_d_psi(&self, psi_drain: f64) -> f64 {
        (self.flux(psi_drain + DRAIN_D_PSI) - self.flux(psi_drain)) / DRAIN_D_PSI
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
