use crate::base::{ParamSoilLayer, PSI_LL15, PSI_WET, PSI_ZERO, SUCTION_D_PF, SUCTION_MAX_IT, SUCTION_TOL};
use crate::StrError;

const LN10: f64 = std::f64::consts::LN_10;

/// Implements the water-retention characteristic curve of one layer
///
/// The curve is a four-segment piecewise cubic Hermite spline over
/// `pf = log10(-psi)` with breakpoints at `psi = -1` (saturation), the
/// reference potential `psid` (drained upper limit), `psi = -15000`
/// (15-bar lower limit), and `psi = -1e7` (oven dry). The first segment is
/// checked for monotonicity and its tangents are rescaled when the Hermite
/// blend would overshoot. Instances are immutable after construction.
#[derive(Clone, Debug)]
pub struct RetentionCurve {
    /// Water content at saturation
    sat: f64,

    /// Breakpoints in pf units (0, pf at psid, pf at -15000, pf at -1e7)
    pf: [f64; 4],

    /// Hermite value at the left end of each segment
    y0: [f64; 4],

    /// Hermite value at the right end of each segment
    y1: [f64; 4],

    /// Hermite tangent (scaled by segment width) at the left end
    m0: [f64; 4],

    /// Hermite tangent (scaled by segment width) at the right end
    m1: [f64; 4],

    /// Indicates that the first-segment tangents were rescaled
    rescaled: bool,
}

impl RetentionCurve {
    /// Allocates a new instance from the layer calibration points
    ///
    /// # Input
    ///
    /// * `param` -- the layer water contents (ll15 < dul < sat)
    /// * `psi_dul` -- the reference potential at the drained upper limit (cm)
    pub fn new(param: &ParamSoilLayer, psi_dul: f64) -> Result<Self, StrError> {
        if !(param.ll15 > 0.0 && param.ll15 < param.dul && param.dul < param.sat) {
            return Err("layer water contents must satisfy 0 < ll15 < dul < sat");
        }
        if psi_dul >= PSI_WET || psi_dul <= PSI_LL15 {
            return Err("the reference potential must lie between -1 and -15000 cm");
        }

        let pf = [0.0, f64::log10(-psi_dul), f64::log10(-PSI_LL15), f64::log10(-PSI_ZERO)];

        // per-segment slopes over pf
        let del = [
            (param.dul - param.sat) / (pf[1] - pf[0]),
            (param.ll15 - param.dul) / (pf[2] - pf[1]),
            (0.0 - param.ll15) / (pf[3] - pf[2]),
            (0.0 - param.ll15) / (pf[3] - pf[2]),
        ];

        // tangents at the breakpoints
        let mut mk = [
            0.0,
            (del[0] + del[1]) / 2.0,
            (del[1] + del[2]) / 2.0,
            del[3],
        ];

        // the first segment may overshoot; rescale the tangents if it does
        let alpha = mk[0] / del[0];
        let beta = mk[1] / del[0];
        let denom = 3.0 * (alpha + beta - 2.0);
        let phi = if denom == 0.0 {
            0.0
        } else {
            alpha - (2.0 * alpha + beta - 3.0) * (2.0 * alpha + beta - 3.0) / denom
        };
        let rescaled = phi <= 0.0;
        if rescaled {
            let tau = 3.0 / f64::sqrt(alpha * alpha + beta * beta);
            mk[0] = tau * alpha * del[0];
            mk[1] = tau * beta * del[0];
        }

        // Hermite control values, tangents scaled by segment width
        let w = [pf[1] - pf[0], pf[2] - pf[1], pf[3] - pf[2]];
        Ok(RetentionCurve {
            sat: param.sat,
            pf,
            y0: [param.sat, param.dul, param.ll15, 0.0],
            y1: [param.dul, param.ll15, 0.0, 0.0],
            m0: [mk[0] * w[0], mk[1] * w[1], mk[2] * w[2], 0.0],
            m1: [mk[1] * w[0], mk[2] * w[1], mk[3] * w[2], 0.0],
            rescaled,
        })
    }

    /// Returns the water content at saturation
    pub fn theta_sat(&self) -> f64 {
        self.sat
    }

    /// Indicates that the first-segment tangents were rescaled for monotonicity
    pub fn rescaled(&self) -> bool {
        self.rescaled
    }

    /// Evaluates the water content at the given matric potential (cm)
    pub fn theta(&self, psi: f64) -> f64 {
        if psi >= PSI_WET {
            return self.sat;
        }
        self.theta_pf(f64::log10(-psi))
    }

    /// Evaluates the derivative of the water content with respect to psi
    pub fn d_theta_d_psi(&self, psi: f64) -> f64 {
        if psi >= PSI_WET || psi <= PSI_ZERO {
            return 0.0;
        }
        let pf = f64::log10(-psi);
        let (i, t, w) = self.locate(pf);
        let t2 = t * t;
        let dh_dt = (6.0 * t2 - 6.0 * t) * self.y0[i]
            + (3.0 * t2 - 4.0 * t + 1.0) * self.m0[i]
            + (-6.0 * t2 + 6.0 * t) * self.y1[i]
            + (3.0 * t2 - 2.0 * t) * self.m1[i];
        // dpf/dpsi = 1/(psi ln10); both factors are negative here
        dh_dt / w / (psi * LN10)
    }

    /// Inverts the curve: finds the matric potential holding the given water content
    ///
    /// Newton iteration with a finite-difference slope; past the iteration cap
    /// the last estimate is returned, so callers must bound their trust in the
    /// result accordingly.
    pub fn suction(&self, theta: f64) -> f64 {
        let mut pf: f64 = 2.0;
        for _ in 0..SUCTION_MAX_IT {
            let est = self.theta_pf(pf);
            let err = est - theta;
            if f64::abs(err) < SUCTION_TOL {
                break;
            }
            let slope = (self.theta_pf(pf + SUCTION_D_PF) - est) / SUCTION_D_PF;
            if slope == 0.0 {
                break;
            }
            pf -= err / slope;
            if pf < 0.0 {
                pf = 0.0;
            }
            if pf > self.pf[3] {
                pf = self.pf[3];
            }
        }
        -f64::powf(10.0, pf)
    }

    /// Evaluates the water content at the given pf = log10(-psi)
    fn theta_pf(&self, pf: f64) -> f64 {
        if pf <= 0.0 {
            return self.sat;
        }
        if pf >= self.pf[3] {
            return 0.0;
        }
        let (i, t, _) = self.locate(pf);
        let t2 = t * t;
        let t3 = t2 * t;
        (2.0 * t3 - 3.0 * t2 + 1.0) * self.y0[i]
            + (t3 - 2.0 * t2 + t) * self.m0[i]
            + (-2.0 * t3 + 3.0 * t2) * self.y1[i]
            + (t3 - t2) * self.m1[i]
    }

    /// Finds the segment index, the normalized position, and the segment width
    fn locate(&self, pf: f64) -> (usize, f64, f64) {
        let i = if pf < self.pf[1] {
            0
        } else if pf < self.pf[2] {
            1
        } else {
            2
        };
        let w = self.pf[i + 1] - self.pf[i];
        (i, (pf - self.pf[i]) / w, w) // t in [0, 1)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::RetentionCurve;
    use crate::base::{ParamSoilLayer, Samples, PSI_LL15};
    use russell_lab::approx_eq;

    #[test]
    fn new_captures_errors() {
        let mut param = Samples::param_loam(15.0);
        param.dul = 0.5; // above sat
        assert_eq!(
            RetentionCurve::new(&param, -100.0).err(),
            Some("layer water contents must satisfy 0 < ll15 < dul < sat")
        );
        let param = Samples::param_loam(15.0);
        assert_eq!(
            RetentionCurve::new(&param, -0.5).err(),
            Some("the reference potential must lie between -1 and -15000 cm")
        );
    }

    #[test]
    fn calibration_points_are_reproduced() {
        let param = Samples::param_loam(15.0);
        let curve = RetentionCurve::new(&param, -100.0).unwrap();
        assert_eq!(curve.theta(-0.5), 0.45);
        approx_eq(curve.theta(-1.0), 0.45, 1e-12);
        approx_eq(curve.theta(-100.0), 0.30, 1e-12);
        approx_eq(curve.theta(PSI_LL15), 0.10, 1e-12);
        approx_eq(curve.theta(-1e7), 0.0, 1e-12);
        assert!(!curve.rescaled());
    }

    #[test]
    fn theta_is_monotone_in_psi() {
        let param = Samples::param_loam(15.0);
        let curve = RetentionCurve::new(&param, -100.0).unwrap();
        let mut prev = curve.theta(-1e7);
        let mut pf = 7.0;
        while pf > 0.0 {
            pf -= 0.005;
            let psi = -f64::powf(10.0, pf);
            let theta = curve.theta(psi);
            assert!(theta >= prev - 1e-13, "theta must not decrease as psi increases");
            assert!(curve.d_theta_d_psi(psi) >= -1e-13);
            prev = theta;
        }
    }

    #[test]
    fn overshoot_triggers_rescale_and_stays_monotone() {
        // nearly flat wet end followed by a steep mid segment
        let param = ParamSoilLayer {
            dx: 15.0,
            bulk_density: 1.3,
            ll15: 0.10,
            dul: 0.30,
            sat: 0.31,
            ks: 100.0,
        };
        let curve = RetentionCurve::new(&param, -1000.0).unwrap();
        assert!(curve.rescaled());
        let mut prev = curve.theta(-1000.0);
        let mut psi = -1000.0;
        while psi < -1.0 {
            psi *= 0.99;
            let theta = curve.theta(psi);
            assert!(theta >= prev - 1e-13);
            prev = theta;
        }
    }

    #[test]
    fn d_theta_d_psi_matches_finite_differences() {
        let param = Samples::param_loam(15.0);
        let curve = RetentionCurve::new(&param, -100.0).unwrap();
        for psi in [-2.0, -50.0, -500.0, -20000.0, -1e6] {
            let d_psi = -psi * 1e-6;
            let numerical = (curve.theta(psi + d_psi) - curve.theta(psi - d_psi)) / (2.0 * d_psi);
            approx_eq(curve.d_theta_d_psi(psi), numerical, 1e-8 + 1e-4 * f64::abs(numerical));
        }
    }

    #[test]
    fn suction_round_trip_works() {
        let param = Samples::param_loam(15.0);
        let curve = RetentionCurve::new(&param, -100.0).unwrap();
        for psi in [-1.5, -10.0, -100.0, -1500.0, -15000.0, -1e6, -9e6] {
            let theta = curve.theta(psi);
            let back = curve.suction(theta);
            approx_eq(f64::log10(-back), f64::log10(-psi), 1e-6);
        }
    }

    #[test]
    fn suction_saturates_gracefully() {
        let param = Samples::param_loam(15.0);
        let curve = RetentionCurve::new(&param, -100.0).unwrap();
        // water content at (or above) saturation maps to the wet breakpoint
        assert_eq!(curve.suction(0.45), -1.0);
    }
}
