use super::Watvar;
use crate::base::{BottomBoundary, TopBoundary};

/// Defines the smallest half-spacing used by the surface/bottom conductances
const MIN_HALF_DX: f64 = 1e-6;

/// Holds a boundary flux and its derivative with respect to the adjacent
/// node's transformed potential
#[derive(Clone, Copy, Debug)]
pub struct BoundaryFlux {
    /// Flux (cm/h, positive downward/out at the bottom)
    pub q: f64,

    /// dq/dp of the adjacent node
    pub dq_dp: f64,
}

/// Defines the active regime of the top boundary within one timestep attempt
///
/// The regime may switch between Newton iterations (e.g. the surface
/// saturates under heavy rainfall, or the pond dries out); each switch is
/// bounded so the iteration cannot cycle forever.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TopRegime {
    /// Prescribed net flux (rainfall minus evaporation)
    Flux,

    /// Fixed matric potential at the surface node (cm)
    Dirichlet(f64),

    /// Surface-storage (ponding) equation active
    Pond,
}

/// Chooses the top regime at the start of a timestep attempt
pub fn initial_top_regime(top: &TopBoundary, pond: f64, net_rate: f64) -> TopRegime {
    match top {
        TopBoundary::ConstantPotential(psi) => TopRegime::Dirichlet(*psi),
        TopBoundary::Ponding { .. } => {
            if pond > 0.0 || net_rate > 0.0 {
                TopRegime::Pond
            } else {
                TopRegime::Flux
            }
        }
        _ => TopRegime::Flux,
    }
}

/// Computes the infiltration flux from the surface store into the first node
///
/// The store potential is the pond depth `h`; the conductance spans half the
/// first layer. Returns `(q, dq/dp0, dq/dh)`.
pub fn surface_infiltration(wv0: &Watvar, h: f64, half_dx: f64) -> (f64, f64, f64) {
    let d = f64::max(half_dx, MIN_HALF_DX);
    let grad = (h - wv0.psi) / d + 1.0;
    let q = wv0.hk * grad;
    let dq_dp0 = wv0.hkp * grad - wv0.hk * wv0.psip / d;
    let dq_dh = wv0.hk / d;
    (q, dq_dp0, dq_dh)
}

/// Computes the power-law runoff rate and its derivative for the ponding law
pub fn runoff_rate(top: &TopBoundary, h: f64) -> (f64, f64) {
    match top {
        TopBoundary::Ponding {
            detention,
            coeff,
            power,
        } => {
            let excess = h - detention;
            if excess <= 0.0 {
                (0.0, 0.0)
            } else {
                (
                    coeff * f64::powf(excess, *power),
                    coeff * power * f64::powf(excess, power - 1.0),
                )
            }
        }
        _ => (0.0, 0.0),
    }
}

/// Computes the bottom boundary flux (positive = leaving the column)
pub fn bottom_flux(bc: &BottomBoundary, wv: &Watvar, half_dx: f64, depth: f64) -> BoundaryFlux {
    let d = f64::max(half_dx, MIN_HALF_DX);
    match bc {
        BottomBoundary::ZeroGradient => BoundaryFlux {
            q: wv.hk,
            dq_dp: wv.hkp,
        },
        BottomBoundary::ConstantPotential(psi_b) => {
            let grad = (wv.psi - psi_b) / d + 1.0;
            BoundaryFlux {
                q: wv.hk * grad,
                dq_dp: wv.hkp * grad + wv.hk * wv.psip / d,
            }
        }
        BottomBoundary::ZeroFlux => BoundaryFlux { q: 0.0, dq_dp: 0.0 },
        BottomBoundary::Seepage(psi_s) => {
            if wv.psi <= *psi_s {
                BoundaryFlux { q: 0.0, dq_dp: 0.0 }
            } else {
                let grad = (wv.psi - psi_s) / d;
                BoundaryFlux {
                    q: wv.hk * grad,
                    dq_dp: wv.hkp * grad + wv.hk * wv.psip / d,
                }
            }
        }
        BottomBoundary::WaterTable(z_wt) => {
            // positive pressure at the bottom face when the table is above it
            let psi_b = depth - z_wt;
            let grad = (wv.psi - psi_b) / d + 1.0;
            BoundaryFlux {
                q: wv.hk * grad,
                dq_dp: wv.hkp * grad + wv.hk * wv.psip / d,
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{bottom_flux, initial_top_regime, runoff_rate, surface_infiltration, TopRegime};
    use crate::base::{BottomBoundary, TopBoundary};
    use crate::engine::Watvar;
    use russell_lab::approx_eq;

    fn sample_watvar(psi: f64, hk: f64) -> Watvar {
        Watvar {
            psi,
            psip: 1.0,
            psipp: 0.0,
            theta: 0.3,
            thp: 1e-4,
            hk,
            hkp: 1e-3,
        }
    }

    #[test]
    fn initial_top_regime_works() {
        let ponding = TopBoundary::Ponding {
            detention: 0.1,
            coeff: 10.0,
            power: 1.0,
        };
        assert_eq!(initial_top_regime(&ponding, 0.5, 0.0), TopRegime::Pond);
        assert_eq!(initial_top_regime(&ponding, 0.0, 1.0), TopRegime::Pond);
        assert_eq!(initial_top_regime(&ponding, 0.0, -0.1), TopRegime::Flux);
        assert_eq!(
            initial_top_regime(&TopBoundary::ConstantPotential(-5.0), 0.0, 0.0),
            TopRegime::Dirichlet(-5.0)
        );
        assert_eq!(initial_top_regime(&TopBoundary::InfiniteConductance, 0.0, 1.0), TopRegime::Flux);
    }

    #[test]
    fn surface_infiltration_works() {
        let wv = sample_watvar(-50.0, 0.4);
        let (q, dq_dp0, dq_dh) = surface_infiltration(&wv, 1.0, 5.0);
        // gradient (1 + 50)/5 + 1 = 11.2
        approx_eq(q, 0.4 * 11.2, 1e-12);
        assert!(dq_dp0.is_finite());
        approx_eq(dq_dh, 0.4 / 5.0, 1e-12);
    }

    #[test]
    fn runoff_law_works() {
        let ponding = TopBoundary::Ponding {
            detention: 0.2,
            coeff: 10.0,
            power: 2.0,
        };
        assert_eq!(runoff_rate(&ponding, 0.1), (0.0, 0.0));
        let (rate, slope) = runoff_rate(&ponding, 0.7);
        approx_eq(rate, 10.0 * 0.25, 1e-12);
        approx_eq(slope, 10.0 * 2.0 * 0.5, 1e-12);
        assert_eq!(runoff_rate(&TopBoundary::InfiniteConductance, 0.7), (0.0, 0.0));
    }

    #[test]
    fn bottom_flux_variants_work() {
        let wv = sample_watvar(-100.0, 0.2);

        let free = bottom_flux(&BottomBoundary::ZeroGradient, &wv, 5.0, 100.0);
        assert_eq!(free.q, 0.2);
        assert_eq!(free.dq_dp, 1e-3);

        let none = bottom_flux(&BottomBoundary::ZeroFlux, &wv, 5.0, 100.0);
        assert_eq!(none.q, 0.0);

        // constant potential wetter than the node pulls water in more slowly
        // than gravity pushes it out
        let fixed = bottom_flux(&BottomBoundary::ConstantPotential(-80.0), &wv, 5.0, 100.0);
        approx_eq(fixed.q, 0.2 * ((-100.0 + 80.0) / 5.0 + 1.0), 1e-12);

        // dry seepage face does not flow
        let seep = bottom_flux(&BottomBoundary::Seepage(-10.0), &wv, 5.0, 100.0);
        assert_eq!(seep.q, 0.0);
        let wet = sample_watvar(5.0, 0.4);
        let seep = bottom_flux(&BottomBoundary::Seepage(-10.0), &wet, 5.0, 100.0);
        approx_eq(seep.q, 0.4 * (5.0 + 10.0) / 5.0, 1e-12);

        // water table below the column drains; at the bottom face it holds
        let table = bottom_flux(&BottomBoundary::WaterTable(120.0), &wv, 5.0, 100.0);
        approx_eq(table.q, 0.2 * ((-100.0 + 20.0) / 5.0 + 1.0), 1e-12);
    }
}
