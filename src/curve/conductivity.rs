use crate::base::{ParamSoilLayer, K_FLOOR, MM_PER_DAY_TO_CM_PER_H, PSI_LL15};
use crate::StrError;

/// Implements the hydraulic-conductivity characteristic curve of one layer
///
/// Conductivity is split into a micro-pore (matrix) component following a
/// Campbell-style power of relative saturation and a macro-pore component
/// carrying the residual between saturated and matrix conductivity:
///
/// ```text
/// K(S) = MicroKs S^MicroP + (Ks - MicroKs) S^MacroP ,  S = theta/sat
/// ```
///
/// Inputs are in mm/day; evaluation returns cm/h.
#[derive(Clone, Debug)]
pub struct ConductivityCurve {
    /// Saturated conductivity (mm/day)
    ks: f64,

    /// Micro-pore conductivity scale (mm/day)
    micro_ks: f64,

    /// Micro-pore exponent (Campbell 2b+3)
    micro_p: f64,

    /// Macro-pore exponent
    macro_p: f64,

    /// Indicates that the macro-pore residual is significant
    has_macro: bool,

    /// Water content at saturation
    sat: f64,
}

impl ConductivityCurve {
    /// Allocates a new instance from the layer calibration points
    ///
    /// # Input
    ///
    /// * `param` -- the layer water contents and saturated conductivity
    /// * `psi_dul` -- the reference potential at the drained upper limit (cm)
    /// * `kdul` -- the conductivity at the drained upper limit (mm/day)
    pub fn new(param: &ParamSoilLayer, psi_dul: f64, kdul: f64) -> Result<Self, StrError> {
        if !(param.ll15 > 0.0 && param.ll15 < param.dul && param.dul < param.sat) {
            return Err("layer water contents must satisfy 0 < ll15 < dul < sat");
        }
        if param.ks <= 0.0 {
            return Err("the saturated conductivity must be positive");
        }
        if kdul <= 0.0 {
            return Err("the conductivity at the drained upper limit must be positive");
        }

        let b = -f64::ln(psi_dul / PSI_LL15) / f64::ln(param.dul / param.ll15);
        let micro_p = b * 2.0 + 3.0;
        let kdula = f64::min(0.99 * kdul, param.ks);
        let s_dul = param.dul / param.sat;
        let micro_ks = kdula / f64::powf(s_dul, micro_p);

        // the macro-pore term only exists while matrix conductivity stays
        // below the saturated conductivity
        let residual = param.ks - micro_ks;
        let (has_macro, macro_p) = if residual > kdula / 99.0 {
            (true, f64::log10(kdula / 99.0 / residual) / f64::log10(s_dul))
        } else {
            (false, 0.0)
        };

        Ok(ConductivityCurve {
            ks: param.ks,
            micro_ks,
            micro_p,
            macro_p,
            has_macro,
            sat: param.sat,
        })
    }

    /// Evaluates the conductivity (cm/h) at the given water content
    pub fn k_theta(&self, theta: f64) -> f64 {
        let s = theta / self.sat;
        if s <= 0.0 {
            return K_FLOOR;
        }
        let s = f64::min(s, 1.0);
        let micro = self.micro_ks * f64::powf(s, self.micro_p);
        let k = if self.has_macro {
            micro + (self.ks - self.micro_ks) * f64::powf(s, self.macro_p)
        } else {
            micro
        };
        k / MM_PER_DAY_TO_CM_PER_H
    }

    /// Evaluates the derivative of the conductivity with respect to theta
    pub fn d_k_d_theta(&self, theta: f64) -> f64 {
        let s = theta / self.sat;
        if s <= 0.0 || s >= 1.0 {
            return 0.0;
        }
        let micro = self.micro_ks * self.micro_p * f64::powf(s, self.micro_p - 1.0);
        let dk_ds = if self.has_macro {
            micro + (self.ks - self.micro_ks) * self.macro_p * f64::powf(s, self.macro_p - 1.0)
        } else {
            micro
        };
        dk_ds / self.sat / MM_PER_DAY_TO_CM_PER_H
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
