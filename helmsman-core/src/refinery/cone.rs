//! Closed-form unsafe speed interval for one candidate heading.
//!
//! With `p0 = ownship - contact` and relative velocity `w = v_os - v_cn`,
//! the CPA over `[0, T]` drops below `d` exactly when some `t` in `(0, T]`
//! puts `p0 + w·t` inside the disc of radius `d`. Dividing by `t`, the
//! unsafe relative velocities are
//!
//! ```text
//!     K = { λ·q : λ >= 1/T, |q + p0| < d }
//! ```
//!
//! which is convex. It splits into the disc `B(-p0/T, d/T)` and the part
//! of the tangent cone beyond the tangent chord. A candidate heading `u`
//! sweeps the line `w(s) = -v_cn + s·u`, so the unsafe speeds on one
//! heading form a single open interval.

use nalgebra::Vector2;

use crate::cpa::CpaEngine;

/// Open interval `(lo, hi)` on the real line; either end may be infinite
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub lo: f64,
    pub hi: f64,
}

impl Interval {
    fn everything() -> Self {
        Interval {
            lo: f64::NEG_INFINITY,
            hi: f64::INFINITY,
        }
    }

    fn is_empty(&self) -> bool {
        !(self.lo < self.hi)
    }

    fn intersect(self, other: Interval) -> Interval {
        Interval {
            lo: self.lo.max(other.lo),
            hi: self.hi.min(other.hi),
        }
    }

    fn hull(self, other: Interval) -> Interval {
        Interval {
            lo: self.lo.min(other.lo),
            hi: self.hi.max(other.hi),
        }
    }

    /// Solutions of `g0 + g1·s < 0`
    fn linear_below_zero(g0: f64, g1: f64) -> Interval {
        if g1 == 0.0 {
            if g0 < 0.0 {
                Interval::everything()
            } else {
                Interval { lo: 0.0, hi: 0.0 }
            }
        } else if g1 > 0.0 {
            Interval {
                lo: f64::NEG_INFINITY,
                hi: -g0 / g1,
            }
        } else {
            Interval {
                lo: -g0 / g1,
                hi: f64::INFINITY,
            }
        }
    }
}

/// The unsafe relative-velocity set for one contact, one threshold and one
/// time horizon.
#[derive(Debug, Clone)]
pub struct UnsafeCone {
    contact_velocity: Vector2<f64>,
    /// Unit vector from ownship toward the contact
    axis: Vector2<f64>,
    /// `axis` rotated a quarter turn
    normal: Vector2<f64>,
    tan_half_angle: f64,
    /// Axial coordinate of the tangent chord
    alpha_chord: f64,
    disc_center: Vector2<f64>,
    disc_radius: f64,
}

impl UnsafeCone {
    /// Returns `None` when ownship is already within `threshold`, in which
    /// case every candidate is unsafe. `horizon` must be positive.
    pub fn new(engine: &CpaEngine, threshold: f64, horizon: f64) -> Option<Self> {
        let p0 = Vector2::new(
            engine.ownship_x() - engine.contact_x(),
            engine.ownship_y() - engine.contact_y(),
        );
        let range = p0.norm();
        if range <= threshold || horizon <= 0.0 {
            return None;
        }

        let axis = -p0 / range;
        let normal = Vector2::new(-axis.y, axis.x);
        let (vx, vy) = engine.contact_velocity();

        let chord_sq = range * range - threshold * threshold;
        Some(UnsafeCone {
            contact_velocity: Vector2::new(vx, vy),
            axis,
            normal,
            tan_half_angle: threshold / chord_sq.sqrt(),
            alpha_chord: chord_sq / (range * horizon),
            disc_center: axis * (range / horizon),
            disc_radius: threshold / horizon,
        })
    }

    /// Open interval of ownship speeds along unit heading `(east, north)`
    /// whose CPA falls below the threshold, or `None` if there are none.
    pub fn unsafe_speeds(&self, heading_unit: (f64, f64)) -> Option<Interval> {
        let u = Vector2::new(heading_unit.0, heading_unit.1);
        let w0 = -self.contact_velocity;

        let disc = self.disc_interval(&w0, &u);
        let cone = self.cone_interval(&w0, &u);

        let band = match (disc.is_empty(), cone.is_empty()) {
            (true, true) => return None,
            (false, true) => disc,
            (true, false) => cone,
            (false, false) => disc.hull(cone),
        };
        Some(band)
    }

    fn disc_interval(&self, w0: &Vector2<f64>, u: &Vector2<f64>) -> Interval {
        // |w0 + s·u - c|² < r²  with |u| = 1
        let e = w0 - self.disc_center;
        let b = u.dot(&e);
        let disc = b * b - e.norm_squared() + self.disc_radius * self.disc_radius;
        if disc <= 0.0 {
            return Interval { lo: 0.0, hi: 0.0 };
        }
        let root = disc.sqrt();
        Interval {
            lo: -b - root,
            hi: -b + root,
        }
    }

    fn cone_interval(&self, w0: &Vector2<f64>, u: &Vector2<f64>) -> Interval {
        let (alpha0, alpha1) = (w0.dot(&self.axis), u.dot(&self.axis));
        let (beta0, beta1) = (w0.dot(&self.normal), u.dot(&self.normal));
        let k = self.tan_half_angle;

        // Beyond the chord: alpha_chord - alpha(s) < 0
        let beyond = Interval::linear_below_zero(self.alpha_chord - alpha0, -alpha1);
        // Inside both cone edges: ±beta(s) - k·alpha(s) < 0
        let left = Interval::linear_below_zero(beta0 - k * alpha0, beta1 - k * alpha1);
        let right = Interval::linear_below_zero(-beta0 - k * alpha0, -beta1 - k * alpha1);

        beyond.intersect(left).intersect(right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{heading_vector, Kinematics};

    /// Brute force: does the CPA over [0, T] fall below d?
    fn brute_unsafe(engine: &CpaEngine, h: f64, v: f64, d: f64, t: f64) -> bool {
        engine.eval_cpa(h, v, t) < d
    }

    #[test]
    fn test_head_on_band() {
        // Contact 1000m north heading south at 5. Heading north, every
        // speed closes to zero inside a long horizon.
        let engine = CpaEngine::new(&Kinematics::new(0.0, 1000.0, 180.0, 5.0), 0.0, 0.0);
        let cone = UnsafeCone::new(&engine, 100.0, 10_000.0).unwrap();
        let band = cone.unsafe_speeds(heading_vector(0.0)).unwrap();
        assert!(band.lo < 0.0);
        assert!(band.hi.is_infinite());

        // Running south, the contact must still gain 900m within the horizon:
        // unsafe below 5 - 900/10000
        let band = cone.unsafe_speeds(heading_vector(180.0)).unwrap();
        assert!((band.hi - 4.91).abs() < 1e-6, "band {:?}", band);
        assert!(band.lo.is_infinite());
    }

    #[test]
    fn test_inside_threshold_has_no_cone() {
        let engine = CpaEngine::new(&Kinematics::new(0.0, 50.0, 180.0, 5.0), 0.0, 0.0);
        assert!(UnsafeCone::new(&engine, 100.0, 60.0).is_none());
        let engine = CpaEngine::new(&Kinematics::new(0.0, 500.0, 180.0, 5.0), 0.0, 0.0);
        assert!(UnsafeCone::new(&engine, 100.0, 0.0).is_none());
    }

    #[test]
    fn test_band_agrees_with_engine() {
        let contacts = [
            (Kinematics::new(0.0, 600.0, 180.0, 4.0), 0.0, 0.0),
            (Kinematics::new(300.0, 300.0, 270.0, 6.0), 0.0, 0.0),
            (Kinematics::new(-200.0, 100.0, 45.0, 2.0), 0.0, 0.0),
            (Kinematics::new(0.0, 0.0, 0.0, 5.0), 0.0, -400.0),
            (Kinematics::new(50.0, 400.0, 0.0, 0.0), 0.0, 0.0),
        ];
        let (d, t) = (120.0, 180.0);
        for (contact, osx, osy) in contacts.iter() {
            let engine = CpaEngine::new(contact, *osx, *osy);
            let cone = UnsafeCone::new(&engine, d, t).unwrap();
            for h in (0..360).step_by(5) {
                let h = h as f64;
                let band = cone.unsafe_speeds(engine.heading_unit(h));
                for s in 0..40 {
                    let v = s as f64 * 0.25;
                    let inside = band.map(|b| v > b.lo && v < b.hi).unwrap_or(false);
                    let cpa = engine.eval_cpa(h, v, t);
                    // Skip cells numerically on the boundary
                    if (cpa - d).abs() < 1e-6 {
                        continue;
                    }
                    assert_eq!(
                        inside,
                        brute_unsafe(&engine, h, v, d, t),
                        "h {} v {} cpa {} band {:?}",
                        h,
                        v,
                        cpa,
                        band
                    );
                }
            }
        }
    }
}
