use super::Profile;
use crate::base::PSI_SCALE;

/// Holds the hydraulic variables of one node and their derivatives
///
/// All derivatives are with respect to the transformed potential `p`,
/// obtained by the chain rule through the characteristic curves.
#[derive(Clone, Copy, Debug)]
pub struct Watvar {
    /// Matric potential (cm)
    pub psi: f64,

    /// dpsi/dp
    pub psip: f64,

    /// d²psi/dp²
    pub psipp: f64,

    /// Volumetric water content
    pub theta: f64,

    /// dtheta/dp
    pub thp: f64,

    /// Hydraulic conductivity (cm/h)
    pub hk: f64,

    /// dhk/dp
    pub hkp: f64,
}

/// Maps the transformed potential to the matric potential
///
/// The transform is linear on the saturated side and hyperbolic-sine on the
/// unsaturated side, so a modest range of `p` spans the many orders of
/// magnitude of suction while staying smooth through saturation:
///
/// ```text
/// psi = p                          for p >= 0
/// psi = PSI_SCALE sinh(p/PSI_SCALE)  for p < 0
/// ```
///
/// Returns `(psi, dpsi/dp, d²psi/dp²)`; both derivatives are continuous at
/// `p = 0`.
pub fn trans(p: f64) -> (f64, f64, f64) {
    if p >= 0.0 {
        (p, 1.0, 0.0)
    } else {
        let u = p / PSI_SCALE;
        (PSI_SCALE * f64::sinh(u), f64::cosh(u), f64::sinh(u) / PSI_SCALE)
    }
}

/// Maps the matric potential back to the transformed potential
pub fn trans_inv(psi: f64) -> f64 {
    if psi >= 0.0 {
        psi
    } else {
        PSI_SCALE * f64::asinh(psi / PSI_SCALE)
    }
}

/// Evaluates the water variables of one node at a transformed potential
pub fn watvar(profile: &Profile, node: usize, p: f64) -> Watvar {
    let (psi, psip, psipp) = trans(p);
    let retention = &profile.retention[node];
    let conductivity = &profile.conductivity[node];
    if psi < 0.0 {
        let theta = retention.theta(psi);
        let thd = retention.d_theta_d_psi(psi);
        let hk = conductivity.k_theta(theta);
        let hkd = conductivity.d_k_d_theta(theta) * thd;
        Watvar {
            psi,
            psip,
            psipp,
            theta,
            thp: thd * psip,
            hk,
            hkp: hkd * psip,
        }
    } else {
        // saturated: the storage and conductivity stop changing
        let theta = retention.theta_sat();
        Watvar {
            psi,
            psip,
            psipp,
            theta,
            thp: 0.0,
            hk: conductivity.k_theta(theta),
            hkp: 0.0,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
