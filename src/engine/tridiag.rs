use crate::base::StepFailure;
use russell_lab::Vector;

/// Defines the smallest pivot magnitude accepted by the elimination
const PIVOT_MIN: f64 = 1e-30;

/// Holds the surface (ponding) equation prepended to the profile system
///
/// The surface store is a distinguished extra unknown ahead of the first
/// profile equation:
///
/// ```text
/// b h + c p0 = rhs         (surface row)
/// a0 h + ...               (coupling of the first profile row to h)
/// ```
#[derive(Clone, Copy, Debug)]
pub struct SurfaceEquation {
    /// Diagonal coefficient (on the surface unknown)
    pub b: f64,

    /// Coupling to the first profile unknown
    pub c: f64,

    /// Right-hand side
    pub rhs: f64,

    /// Coupling of the first profile row back to the surface unknown
    pub a0: f64,
}

/// Implements the Thomas algorithm for the banded water/solute systems
///
/// Standard forward elimination and back substitution over the `a,b,c`
/// bands, optionally preceded by one surface-storage equation. A zero pivot
/// is reported as a recoverable [StepFailure::ZeroPivot] value so callers
/// can react with timestep reduction instead of aborting.
pub struct Tridiag {
    /// Number of profile equations
    pub n: usize,

    /// Sub-diagonal band (a[0] is unused)
    pub a: Vector,

    /// Diagonal band
    pub b: Vector,

    /// Super-diagonal band (c[n-1] is unused)
    pub c: Vector,

    /// Right-hand side
    pub rhs: Vector,

    /// Optional prepended surface equation
    pub surface: Option<SurfaceEquation>,

    /// Elimination scratch (diagonal)
    den: Vector,

    /// Elimination scratch (right-hand side)
    rs: Vector,
}

impl Tridiag {
    /// Allocates a new instance for n profile equations
    pub fn new(n: usize) -> Self {
        Tridiag {
            n,
            a: Vector::new(n),
            b: Vector::new(n),
            c: Vector::new(n),
            rhs: Vector::new(n),
            surface: None,
            den: Vector::new(n),
            rs: Vector::new(n),
        }
    }

    /// Clears all bands, the right-hand side, and the surface equation
    pub fn reset(&mut self) {
        self.a.fill(0.0);
        self.b.fill(0.0);
        self.c.fill(0.0);
        self.rhs.fill(0.0);
        self.surface = None;
    }

    /// Solves the system, writing the surface unknown and the profile unknowns
    ///
    /// `x_surface` is only meaningful when a surface equation is present.
    pub fn solve(&mut self, x_surface: &mut f64, x: &mut Vector) -> Result<(), StepFailure> {
        let n = self.n;

        // fold the surface equation into the first profile row
        let mut b0 = self.b[0];
        let mut rhs0 = self.rhs[0];
        if let Some(surface) = self.surface {
            if f64::abs(surface.b) < PIVOT_MIN {
                return Err(StepFailure::ZeroPivot);
            }
            let factor = surface.a0 / surface.b;
            b0 -= factor * surface.c;
            rhs0 -= factor * surface.rhs;
        }

        // forward elimination
        if f64::abs(b0) < PIVOT_MIN {
            return Err(StepFailure::ZeroPivot);
        }
        self.den[0] = b0;
        self.rs[0] = rhs0;
        for i in 1..n {
            let m = self.a[i] / self.den[i - 1];
            self.den[i] = self.b[i] - m * self.c[i - 1];
            self.rs[i] = self.rhs[i] - m * self.rs[i - 1];
            if f64::abs(self.den[i]) < PIVOT_MIN {
                return Err(StepFailure::ZeroPivot);
            }
        }

        // back substitution
        x[n - 1] = self.rs[n - 1] / self.den[n - 1];
        for i in (0..n - 1).rev() {
            x[i] = (self.rs[i] - self.c[i] * x[i + 1]) / self.den[i];
        }

        // recover the surface unknown
        if let Some(surface) = self.surface {
            *x_surface = (surface.rhs - surface.c * x[0]) / surface.b;
        } else {
            *x_surface = 0.0;
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
