//! CPA engine construction and the closed-form range queries.

use super::tables::{DegreeTable, FineTable, HEADING_CACHE_SIZE};
use crate::geometry::{
    angle180, angle360, cos_deg, deg_to_rad, rel_ang, rel_bearing, speed_in_heading, Kinematics,
};

/// Closest-point-of-approach engine for one contact and one ownship position.
///
/// The range between the two platforms, with ownship on a candidate heading
/// `h` and speed `v`, follows `range²(t) = k2·t² + k1·t + k0`. Everything that
/// does not depend on `(h, v)` is computed once in [`CpaEngine::reset`];
/// the heading-dependent parts live in 360-entry tables indexed by
/// `floor(h) mod 360`. Every query is then O(1).
///
/// Candidate headings are evaluated at their integer degree: 45.7 is treated
/// as 45 by every query, so all queries on one engine agree with each other.
#[derive(Debug, Clone, PartialEq)]
pub struct CpaEngine {
    pub(super) initialized: bool,

    pub(super) cnx: f64,
    pub(super) cny: f64,
    pub(super) cnh: f64,
    pub(super) cnv: f64,
    pub(super) osx: f64,
    pub(super) osy: f64,

    pub(super) stat_k0: f64,
    pub(super) stat_k1: f64,
    pub(super) stat_k2: f64,
    pub(super) stat_range: f64,

    pub(super) cn_to_os_spd: f64,
    pub(super) cn_to_os_closing: bool,
    pub(super) abs_bng_os_cn: f64,
    pub(super) abs_bng_cn_os: f64,
    pub(super) rel_bng_cn_os: f64,
    pub(super) theta_tn: f64,
    pub(super) tn_constant: f64,
    pub(super) spd_cn_at_tangent: f64,

    pub(super) os_on_contact: bool,
    pub(super) os_on_bowline: bool,
    pub(super) os_on_sternline: bool,
    pub(super) os_on_beam: bool,
    pub(super) os_fore_of_cn: bool,
    pub(super) os_aft_of_cn: bool,
    pub(super) os_port_of_cn: bool,
    pub(super) os_star_of_cn: bool,

    pub(super) range_gam: f64,
    pub(super) range_eps: f64,
    pub(super) theta_os_gam: f64,
    pub(super) theta_os_eps: f64,

    pub(super) cos_cache: DegreeTable,
    pub(super) sin_cache: DegreeTable,
    pub(super) cos_cache_fine: FineTable,
    pub(super) sin_cache_fine: FineTable,
    pub(super) k1_cache: DegreeTable,
    pub(super) k2_cache: DegreeTable,
    pub(super) vthresh_cache: DegreeTable,
    pub(super) os_cn_relbng_cache: DegreeTable,
    pub(super) os_cn_relbng_cos_cache: DegreeTable,
    pub(super) os_tn_cos_cache: DegreeTable,
    pub(super) os_gam_cos_cache: DegreeTable,
    pub(super) os_cnh_cos_cache: DegreeTable,
}

impl Default for CpaEngine {
    /// An engine that has never been reset. Queries return zeros and
    /// [`CpaEngine::is_initialized`] is false.
    fn default() -> Self {
        CpaEngine {
            initialized: false,
            cnx: 0.0,
            cny: 0.0,
            cnh: 0.0,
            cnv: 0.0,
            osx: 0.0,
            osy: 0.0,
            stat_k0: 0.0,
            stat_k1: 0.0,
            stat_k2: 0.0,
            stat_range: 0.0,
            cn_to_os_spd: 0.0,
            cn_to_os_closing: false,
            abs_bng_os_cn: 0.0,
            abs_bng_cn_os: 0.0,
            rel_bng_cn_os: 0.0,
            theta_tn: 0.0,
            tn_constant: 0.0,
            spd_cn_at_tangent: 0.0,
            os_on_contact: false,
            os_on_bowline: false,
            os_on_sternline: false,
            os_on_beam: false,
            os_fore_of_cn: false,
            os_aft_of_cn: false,
            os_port_of_cn: false,
            os_star_of_cn: false,
            range_gam: 0.0,
            range_eps: 0.0,
            theta_os_gam: 0.0,
            theta_os_eps: 0.0,
            cos_cache: DegreeTable::zeroed(),
            sin_cache: DegreeTable::zeroed(),
            cos_cache_fine: FineTable::zeroed(),
            sin_cache_fine: FineTable::zeroed(),
            k1_cache: DegreeTable::zeroed(),
            k2_cache: DegreeTable::zeroed(),
            vthresh_cache: DegreeTable::zeroed(),
            os_cn_relbng_cache: DegreeTable::zeroed(),
            os_cn_relbng_cos_cache: DegreeTable::zeroed(),
            os_tn_cos_cache: DegreeTable::zeroed(),
            os_gam_cos_cache: DegreeTable::zeroed(),
            os_cnh_cos_cache: DegreeTable::zeroed(),
        }
    }
}

impl CpaEngine {
    /// Build an engine for `contact` as seen from ownship at `(osx, osy)`.
    pub fn new(contact: &Kinematics, osx: f64, osy: f64) -> Self {
        let mut engine = CpaEngine::default();
        engine.reset(contact, osx, osy);
        engine
    }

    /// Rebuild every static value and cache table.
    ///
    /// Negative or non-finite contact speed is clamped to zero, and the
    /// contact heading is wrapped into `[0, 360)`.
    pub fn reset(&mut self, contact: &Kinematics, osx: f64, osy: f64) {
        self.cnx = contact.x;
        self.cny = contact.y;
        self.cnh = angle360(contact.heading);
        self.cnv = if contact.speed.is_finite() {
            contact.speed.max(0.0)
        } else {
            0.0
        };
        self.osx = osx;
        self.osy = osy;

        self.init_trig_cache();
        self.set_static();
        self.init_k_caches();
        self.init_relbng_caches();
        self.init_vthresh_cache();
        self.init_gamma_epsilon();

        self.initialized = true;
        log::trace!(
            "cpa engine reset: range {:.1} rel_bng {:.1} fore {} aft {} port {} star {}",
            self.stat_range,
            self.rel_bng_cn_os,
            self.os_fore_of_cn,
            self.os_aft_of_cn,
            self.os_port_of_cn,
            self.os_star_of_cn
        );
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    // =========================================================================
    // Cache construction
    // =========================================================================

    fn init_trig_cache(&mut self) {
        self.cos_cache = DegreeTable::from_fn(|h| deg_to_rad(h).cos());
        self.sin_cache = DegreeTable::from_fn(|h| deg_to_rad(h).sin());
        self.cos_cache_fine = FineTable::from_fn(|h| deg_to_rad(h).cos());
        self.sin_cache_fine = FineTable::from_fn(|h| deg_to_rad(h).sin());
    }

    fn set_static(&mut self) {
        let (cnx, cny, cnh, cnv) = (self.cnx, self.cny, self.cnh, self.cnv);
        let (osx, osy) = (self.osx, self.osy);

        self.os_on_contact = osx == cnx && osy == cny;

        self.rel_bng_cn_os = rel_bearing(cnx, cny, cnh, osx, osy);
        self.abs_bng_os_cn = rel_ang(osx, osy, cnx, cny);
        self.abs_bng_cn_os = rel_ang(cnx, cny, osx, osy);
        self.theta_tn = angle360(self.abs_bng_os_cn + 90.0);

        self.spd_cn_at_tangent = speed_in_heading(cnh, cnv, self.theta_tn);
        self.cn_to_os_spd = speed_in_heading(cnh, cnv, self.abs_bng_cn_os);
        self.cn_to_os_closing = self.cn_to_os_spd > 0.0;

        let cnh_rad = deg_to_rad(cnh);
        let (cos_cnh, sin_cnh) = (cnh_rad.cos(), cnh_rad.sin());

        self.stat_k2 = cnv * cnv;

        self.stat_k1 = -2.0 * osy * cos_cnh * cnv;
        self.stat_k1 += -2.0 * osx * sin_cnh * cnv;
        self.stat_k1 += 2.0 * cny * cos_cnh * cnv;
        self.stat_k1 += 2.0 * cnx * sin_cnh * cnv;

        let (dx, dy) = (osx - cnx, osy - cny);
        self.stat_k0 = dx * dx + dy * dy;
        self.stat_range = self.stat_k0.sqrt();

        self.tn_constant = if self.stat_range > 0.0 {
            360.0 / (2.0 * self.stat_range * std::f64::consts::PI)
        } else {
            0.0
        };

        // Coincident platforms are on no line and no side
        self.os_on_bowline = false;
        self.os_on_sternline = false;
        if !self.os_on_contact {
            if self.abs_bng_cn_os == cnh {
                self.os_on_bowline = true;
            } else if self.abs_bng_cn_os == angle360(cnh - 180.0) {
                self.os_on_sternline = true;
            }
        }

        let rel = self.rel_bng_cn_os;
        if self.os_on_contact {
            self.os_fore_of_cn = false;
            self.os_aft_of_cn = false;
            self.os_port_of_cn = false;
            self.os_star_of_cn = false;
        } else {
            self.os_fore_of_cn = !(rel > 90.0 && rel < 270.0);
            self.os_aft_of_cn = (90.0..=270.0).contains(&rel);
            self.os_port_of_cn = rel == 0.0 || (180.0..360.0).contains(&rel);
            self.os_star_of_cn = (0.0..=180.0).contains(&rel);
        }

        self.os_on_beam = self.os_on_contact || (self.os_fore_of_cn && self.os_aft_of_cn);

        self.theta_os_gam = if self.os_port_of_cn {
            angle360(cnh + 90.0)
        } else {
            angle360(cnh - 90.0)
        };
        self.theta_os_eps = if self.os_fore_of_cn {
            angle360(cnh + 180.0)
        } else {
            cnh
        };
    }

    fn init_k_caches(&mut self) {
        let cnh_rad = deg_to_rad(self.cnh);
        let cos_cnh_x_spd = -2.0 * cnh_rad.cos() * self.cnv;
        let sin_cnh_x_spd = -2.0 * cnh_rad.sin() * self.cnv;

        let k1 = DegreeTable::from_fn(|h| {
            let (c, s) = (self.cos_cache.get(h), self.sin_cache.get(h));
            2.0 * c * self.osy + 2.0 * s * self.osx - 2.0 * c * self.cny - 2.0 * s * self.cnx
        });
        let k2 = DegreeTable::from_fn(|h| {
            self.cos_cache.get(h) * cos_cnh_x_spd + self.sin_cache.get(h) * sin_cnh_x_spd
        });
        self.k1_cache = k1;
        self.k2_cache = k2;
    }

    fn init_relbng_caches(&mut self) {
        let abs_bng = self.abs_bng_os_cn;
        self.os_cn_relbng_cache = DegreeTable::from_fn(|h| angle360(abs_bng - h));
        // cos_deg is exactly zero on the beam headings
        self.os_cn_relbng_cos_cache = DegreeTable::from_fn(|h| cos_deg(abs_bng - h));

        let theta_tn = self.theta_tn;
        self.os_tn_cos_cache = DegreeTable::from_fn(|h| cos_deg(h - theta_tn));
    }

    /// Per heading, the ownship speed at which the current range stops
    /// shrinking. At or beyond it (closing contact) or at or below it
    /// (opening contact) the CPA is the current range.
    fn init_vthresh_cache(&mut self) {
        let spd = self.cn_to_os_spd;
        self.vthresh_cache = if self.cn_to_os_closing {
            // Ownship must open along the line of sight faster than the contact closes
            let away = self.abs_bng_cn_os;
            DegreeTable::from_fn(|h| {
                let c = cos_deg(h - away);
                if c > 0.0 {
                    spd / c
                } else {
                    f64::INFINITY
                }
            })
        } else {
            // Ownship closes no faster than the contact opens
            let toward = self.abs_bng_os_cn;
            DegreeTable::from_fn(|h| {
                let c = cos_deg(h - toward);
                if c > 0.0 {
                    -spd / c
                } else {
                    f64::INFINITY
                }
            })
        };
    }

    fn init_gamma_epsilon(&mut self) {
        let rel180 = ang_fold(self.rel_bng_cn_os);
        if rel180 == 0.0 || rel180 == 180.0 {
            self.range_gam = 0.0;
            self.range_eps = self.stat_range;
        } else if rel180 == 90.0 {
            self.range_gam = self.stat_range;
            self.range_eps = 0.0;
        } else {
            self.range_gam = self.stat_range * deg_to_rad(90.0 - rel180).cos();
            let eps_sq = self.stat_range * self.stat_range - self.range_gam * self.range_gam;
            self.range_eps = eps_sq.max(0.0).sqrt();
        }

        let theta_gam = self.theta_os_gam;
        self.os_gam_cos_cache = DegreeTable::from_fn(|h| cos_deg(h - theta_gam));
        let cnh = self.cnh;
        self.os_cnh_cos_cache = DegreeTable::from_fn(|h| cos_deg(h - cnh));
    }

    // =========================================================================
    // Range queries
    // =========================================================================

    #[inline]
    fn k2_for(&self, osh: f64, osv: f64) -> f64 {
        self.stat_k2 + (self.k2_cache.get(osh) + osv) * osv
    }

    #[inline]
    fn k1_for(&self, osh: f64, osv: f64) -> f64 {
        self.stat_k1 + self.k1_cache.get(osh) * osv
    }

    /// Minimum predicted range over `[0, ostol]` seconds with ownship on
    /// heading `osh` at speed `osv`.
    pub fn eval_cpa(&self, osh: f64, osv: f64, ostol: f64) -> f64 {
        if self.speed_cannot_close(osh, osv) {
            return self.stat_range;
        }
        self.eval_cpa_closed_form(osh, osv, ostol)
    }

    /// The early-exit guard: true when the candidate speed on this heading
    /// leaves the range non-decreasing from t = 0.
    #[inline]
    fn speed_cannot_close(&self, osh: f64, osv: f64) -> bool {
        let thresh = self.vthresh_cache.get(osh);
        if self.cn_to_os_closing {
            osv > self.cn_to_os_spd && osv >= thresh
        } else {
            osv <= thresh
        }
    }

    pub(super) fn eval_cpa_closed_form(&self, osh: f64, osv: f64, ostol: f64) -> f64 {
        let k2 = self.k2_for(osh, osv);
        if k2 < 0.0 {
            return self.stat_range;
        }
        let k1 = self.k1_for(osh, osv);

        let mut min_t = 0.0;
        if k2 != 0.0 {
            min_t = k1 / (-2.0 * k2);
        }
        if min_t <= 0.0 {
            return self.stat_range;
        }
        if min_t >= ostol {
            min_t = ostol;
        }

        let dist_squared = min_t * (k2 * min_t + k1) + self.stat_k0;
        if dist_squared > 0.0 {
            dist_squared.sqrt()
        } else {
            0.0
        }
    }

    /// Unclamped time of closest approach. Zero when the range is already
    /// at its minimum (opening, or no relative motion).
    pub fn eval_time_cpa(&self, osh: f64, osv: f64) -> f64 {
        if self.speed_cannot_close(osh, osv) {
            return 0.0;
        }
        let k2 = self.k2_for(osh, osv);
        if k2 <= 0.0 {
            return 0.0;
        }
        let k1 = self.k1_for(osh, osv);
        let min_t = k1 / (-2.0 * k2);
        min_t.max(0.0)
    }

    /// Range at time `t` (not necessarily the CPA time)
    pub fn eval_range_at(&self, osh: f64, osv: f64, t: f64) -> f64 {
        let k2 = self.k2_for(osh, osv);
        let k1 = self.k1_for(osh, osv);
        let range_squared = k2 * t * t + k1 * t + self.stat_k0;
        range_squared.max(0.0).sqrt()
    }

    /// Rate of change of range squared at time `t`
    pub fn eval_range_rate_at(&self, osh: f64, osv: f64, t: f64) -> f64 {
        let k2 = self.k2_for(osh, osv);
        let k1 = self.k1_for(osh, osv);
        2.0 * k2 * t + k1
    }

    /// Instantaneous rate of closure. Positive when closing.
    pub fn eval_roc(&self, osh: f64, osv: f64) -> f64 {
        self.os_cn_relbng_cos_cache.get(osh) * osv + self.cn_to_os_spd
    }

    /// Rate of closure at tenth-of-a-degree heading resolution.
    pub fn eval_roc_fine(&self, osh: f64, osv: f64) -> f64 {
        let (ux, uy) = self.heading_unit_fine(osh);
        let (bx, by) = self.heading_unit_fine(self.abs_bng_os_cn);
        (ux * bx + uy * by) * osv + self.cn_to_os_spd
    }

    /// Sweep `heading_clicks` evenly spaced headings at `speed` and return
    /// `(min_roc, max_roc, heading_of_max_roc)`. More than 360 clicks uses
    /// the tenth-degree tables.
    pub fn min_max_roc(&self, speed: f64, heading_clicks: usize) -> (f64, f64, f64) {
        let clicks = heading_clicks.max(1);
        let delta = 360.0 / clicks as f64;
        let fine = clicks > HEADING_CACHE_SIZE;

        let mut min_roc = f64::INFINITY;
        let mut max_roc = f64::NEG_INFINITY;
        let mut max_heading = 0.0;
        for i in 0..clicks {
            let heading = i as f64 * delta;
            let roc = if fine {
                self.eval_roc_fine(heading, speed)
            } else {
                self.eval_roc(heading, speed)
            };
            if roc > max_roc {
                max_roc = roc;
                max_heading = heading;
            }
            if roc < min_roc {
                min_roc = roc;
            }
        }
        (min_roc, max_roc, max_heading)
    }

    /// Signed rate of change (degrees per second) of the absolute bearing
    /// from ownship to the contact. Zero when the platforms coincide.
    pub fn bearing_rate(&self, osh: f64, osv: f64) -> f64 {
        let os_spd_at_tangent = self.os_tn_cos_cache.get(osh) * -osv;
        (os_spd_at_tangent + self.spd_cn_at_tangent) * self.tn_constant
    }

    // =========================================================================
    // Static accessors
    // =========================================================================

    pub fn range(&self) -> f64 {
        self.stat_range
    }

    /// Distance from ownship to the contact's bow-stern line
    pub fn range_gamma(&self) -> f64 {
        self.range_gam
    }

    /// Distance from ownship to the contact's beam line
    pub fn range_epsilon(&self) -> f64 {
        self.range_eps
    }

    /// Heading that takes ownship straight toward the contact's bow-stern line
    pub fn theta_gamma(&self) -> f64 {
        self.theta_os_gam
    }

    /// Heading that takes ownship straight toward the contact's beam line
    pub fn theta_epsilon(&self) -> f64 {
        self.theta_os_eps
    }

    /// Component of contact velocity toward ownship's position
    pub fn contact_speed_toward_ownship(&self) -> f64 {
        self.cn_to_os_spd
    }

    /// Absolute bearing from ownship to contact
    pub fn bearing_ownship_to_contact(&self) -> f64 {
        self.abs_bng_os_cn
    }

    /// Absolute bearing from contact to ownship (the flee heading)
    pub fn bearing_contact_to_ownship(&self) -> f64 {
        self.abs_bng_cn_os
    }

    /// Bearing of ownship relative to the contact's bow
    pub fn contact_relative_bearing(&self) -> f64 {
        self.rel_bng_cn_os
    }

    /// Bearing of the contact relative to ownship's bow on heading `osh`
    pub fn ownship_contact_rel_bearing(&self, osh: f64) -> f64 {
        self.os_cn_relbng_cache.get(osh)
    }

    pub fn contact_x(&self) -> f64 {
        self.cnx
    }

    pub fn contact_y(&self) -> f64 {
        self.cny
    }

    pub fn contact_heading(&self) -> f64 {
        self.cnh
    }

    pub fn contact_speed(&self) -> f64 {
        self.cnv
    }

    pub fn ownship_x(&self) -> f64 {
        self.osx
    }

    pub fn ownship_y(&self) -> f64 {
        self.osy
    }

    /// Unit vector `(east, north)` for the integer-degree entry of `heading`.
    pub fn heading_unit(&self, heading: f64) -> (f64, f64) {
        (self.sin_cache.get(heading), self.cos_cache.get(heading))
    }

    /// Unit vector `(east, north)` at tenth-of-a-degree resolution.
    pub fn heading_unit_fine(&self, heading: f64) -> (f64, f64) {
        (self.sin_cache_fine.get(heading), self.cos_cache_fine.get(heading))
    }

    /// Contact velocity `(east, north)`
    pub fn contact_velocity(&self) -> (f64, f64) {
        let rad = deg_to_rad(self.cnh);
        (rad.sin() * self.cnv, rad.cos() * self.cnv)
    }

    /// Ownship speed along the contact's heading
    pub fn os_speed_in_cn_heading(&self, osh: f64, osv: f64) -> f64 {
        self.os_cnh_cos_cache.get(osh) * osv
    }

    /// Ownship speed toward the contact's bow-stern line
    pub fn os_speed_gamma(&self, osh: f64, osv: f64) -> f64 {
        self.os_gam_cos_cache.get(osh) * osv
    }

    /// Ownship speed toward the contact's beam line, net of contact motion
    pub fn os_speed_epsilon(&self, osh: f64, osv: f64) -> f64 {
        let v_os_cnh = self.os_speed_in_cn_heading(osh, osv);
        if self.os_fore_of_cn {
            self.cnv - v_os_cnh
        } else {
            v_os_cnh - self.cnv
        }
    }

    /// Time for ownship to reach the contact's bow-stern line. Zero on
    /// the line, on the contact, or with no speed toward the line.
    pub fn os_time_gamma(&self, osh: f64, osv: f64) -> f64 {
        if self.os_on_contact || self.os_on_bowline || self.os_on_sternline {
            return 0.0;
        }
        let v_os_gam = self.os_speed_gamma(osh, osv);
        if v_os_gam == 0.0 {
            return 0.0;
        }
        self.range_gam / v_os_gam
    }

    /// Time for ownship to reach the contact's beam line. Zero on the beam,
    /// on the contact, or with no relative speed toward the beam.
    pub fn os_time_epsilon(&self, osh: f64, osv: f64) -> f64 {
        if self.os_on_contact || self.os_on_beam {
            return 0.0;
        }
        let v_os_eps = self.os_speed_epsilon(osh, osv);
        if v_os_eps == 0.0 {
            return 0.0;
        }
        self.range_eps / v_os_eps
    }

    /// Raw velocity-threshold entry for a heading
    pub fn velocity_threshold(&self, osh: f64) -> f64 {
        self.vthresh_cache.get(osh)
    }

    /// True if the contact is currently closing on ownship's position
    pub fn contact_closing(&self) -> bool {
        self.cn_to_os_closing
    }
}

/// Fold a relative bearing into `[0, 180]`.
fn ang_fold(rel: f64) -> f64 {
    angle180(rel).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn astern_engine() -> CpaEngine {
        // Contact at origin heading north at 5, ownship 100m astern
        CpaEngine::new(&Kinematics::new(0.0, 0.0, 0.0, 5.0), 0.0, -100.0)
    }

    #[test]
    fn test_default_uninitialized() {
        let engine = CpaEngine::default();
        assert!(!engine.is_initialized());
        assert_eq!(engine.eval_cpa(0.0, 1.0, 60.0), 0.0);
        assert!(astern_engine().is_initialized());
    }

    #[test]
    fn test_matching_course_speed_keeps_range() {
        let engine = astern_engine();
        let cpa = engine.eval_cpa(0.0, 5.0, 120.0);
        assert!((cpa - 100.0).abs() < 1e-6, "cpa {}", cpa);
    }

    #[test]
    fn test_astern_closing_trends_to_zero() {
        let engine = astern_engine();
        // Heading 180 opens on a contact running north
        assert!((engine.eval_cpa(180.0, 5.0, 120.0) - 100.0).abs() < 1e-9);

        // Overtaking at 10 closes at 5: contact reached after 20 seconds
        let at_10 = engine.eval_cpa(0.0, 10.0, 10.0);
        let at_20 = engine.eval_cpa(0.0, 10.0, 20.0);
        let at_40 = engine.eval_cpa(0.0, 10.0, 40.0);
        assert!((at_10 - 50.0).abs() < 1e-6, "at_10 {}", at_10);
        assert!(at_20 < 1e-6, "at_20 {}", at_20);
        assert!(at_40 < 1e-6, "at_40 {}", at_40);

        // Contact reversing onto a stationary ownship closes at 5 as well
        let engine = CpaEngine::new(&Kinematics::new(0.0, 0.0, 180.0, 5.0), 0.0, -100.0);
        assert!((engine.eval_cpa(0.0, 0.0, 10.0) - 50.0).abs() < 1e-6);
        assert!(engine.eval_cpa(0.0, 0.0, 30.0) < 1e-6);
    }

    #[test]
    fn test_eval_cpa_deterministic() {
        let engine = CpaEngine::new(&Kinematics::new(120.0, 40.0, 215.0, 3.5), -30.0, 10.0);
        for h in [0.0, 33.3, 180.0, 271.9] {
            let a = engine.eval_cpa(h, 4.0, 90.0);
            let b = engine.eval_cpa(h, 4.0, 90.0);
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_early_exit_matches_closed_form() {
        let contacts = [
            Kinematics::new(0.0, 200.0, 180.0, 4.0),
            Kinematics::new(150.0, -80.0, 45.0, 2.0),
            Kinematics::new(-60.0, 90.0, 300.0, 0.0),
            Kinematics::new(10.0, 10.0, 90.0, 6.0),
        ];
        for contact in contacts.iter() {
            let engine = CpaEngine::new(contact, 0.0, 0.0);
            for h in 0..360 {
                for s in 0..12 {
                    let (h, v) = (h as f64, s as f64 * 0.75);
                    let fast = engine.eval_cpa(h, v, 300.0);
                    let full = engine.eval_cpa_closed_form(h, v, 300.0);
                    assert!(
                        (fast - full).abs() < 1e-6,
                        "h {} v {} fast {} full {}",
                        h,
                        v,
                        fast,
                        full
                    );
                }
            }
        }
    }

    #[test]
    fn test_heading_normalized_before_lookup() {
        let engine = CpaEngine::new(&Kinematics::new(50.0, 50.0, 270.0, 2.0), 0.0, 0.0);
        assert_eq!(engine.eval_cpa(-90.0, 3.0, 60.0), engine.eval_cpa(270.0, 3.0, 60.0));
        assert_eq!(engine.eval_cpa(405.0, 3.0, 60.0), engine.eval_cpa(45.0, 3.0, 60.0));
        assert_eq!(engine.eval_roc(720.0, 3.0), engine.eval_roc(0.0, 3.0));
    }

    #[test]
    fn test_monotone_in_speed_heading_away() {
        // Contact directly ahead and closing head-on
        let engine = CpaEngine::new(&Kinematics::new(0.0, 200.0, 180.0, 4.0), 0.0, 0.0);
        for h in [100.0, 135.0, 180.0, 225.0, 260.0] {
            let mut last = 0.0;
            for s in 0..20 {
                let cpa = engine.eval_cpa(h, s as f64 * 0.5, 600.0);
                assert!(cpa + 1e-9 >= last, "h {} s {} cpa {} last {}", h, s, cpa, last);
                last = cpa;
            }
        }
        // Fleeing directly at or above the closing speed keeps current range
        assert!((engine.eval_cpa(180.0, 4.0, 600.0) - 200.0).abs() < 1e-9);
        assert!((engine.eval_cpa(180.0, 6.0, 600.0) - 200.0).abs() < 1e-9);
        assert!(engine.eval_cpa(180.0, 3.0, 600.0) < 200.0);
    }

    #[test]
    fn test_time_cpa_head_on() {
        let engine = CpaEngine::new(&Kinematics::new(0.0, 200.0, 180.0, 4.0), 0.0, 0.0);
        let t = engine.eval_time_cpa(0.0, 6.0);
        assert!((t - 20.0).abs() < 1e-6, "t {}", t);
        assert_eq!(engine.eval_time_cpa(180.0, 6.0), 0.0);
    }

    #[test]
    fn test_range_and_rate_at() {
        let engine = CpaEngine::new(&Kinematics::new(0.0, 200.0, 180.0, 4.0), 0.0, 0.0);
        assert!((engine.eval_range_at(0.0, 6.0, 10.0) - 100.0).abs() < 1e-6);
        assert!((engine.eval_range_at(0.0, 6.0, 0.0) - 200.0).abs() < 1e-9);
        // d(r²)/dt = 2·r·dr/dt = 2·200·(-10)
        assert!((engine.eval_range_rate_at(0.0, 6.0, 0.0) + 4000.0).abs() < 1e-6);
    }

    #[test]
    fn test_roc_and_min_max() {
        let engine = CpaEngine::new(&Kinematics::new(0.0, 200.0, 180.0, 4.0), 0.0, 0.0);
        assert!((engine.eval_roc(0.0, 6.0) - 10.0).abs() < 1e-9);
        assert!((engine.eval_roc(90.0, 6.0) - 4.0).abs() < 1e-9);
        assert!((engine.eval_roc(180.0, 6.0) + 2.0).abs() < 1e-9);

        let (min_roc, max_roc, max_heading) = engine.min_max_roc(6.0, 36);
        assert!((max_roc - 10.0).abs() < 1e-9);
        assert!((min_roc + 2.0).abs() < 1e-9);
        assert_eq!(max_heading, 0.0);

        let (_, fine_max, fine_heading) = engine.min_max_roc(6.0, 3600);
        assert!((fine_max - 10.0).abs() < 1e-9);
        assert_eq!(fine_heading, 0.0);
    }

    #[test]
    fn test_bearing_rate_signs() {
        // Contact due north, stationary. Ownship moving east: the bearing
        // to the contact swings counter-clockwise (decreasing).
        let engine = CpaEngine::new(&Kinematics::new(0.0, 100.0, 0.0, 0.0), 0.0, 0.0);
        assert!(engine.bearing_rate(90.0, 5.0) < 0.0);
        assert!(engine.bearing_rate(270.0, 5.0) > 0.0);
        assert_eq!(engine.bearing_rate(0.0, 5.0), 0.0);
        // 5 m/s across 100m: 5 / (2·π·100) turns per second
        let expected = 5.0 * 360.0 / (2.0 * std::f64::consts::PI * 100.0);
        assert!((engine.bearing_rate(270.0, 5.0) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_relation_flags() {
        // Contact heading north at origin, ownship ahead and to starboard
        let engine = CpaEngine::new(&Kinematics::new(0.0, 0.0, 0.0, 3.0), 50.0, 50.0);
        assert!(engine.os_fore_of_cn);
        assert!(!engine.os_aft_of_cn);
        assert!(engine.os_star_of_cn);
        assert!(!engine.os_port_of_cn);
        assert!((engine.range_gamma() - 50.0).abs() < 1e-9);
        assert!((engine.range_epsilon() - 50.0).abs() < 1e-9);
        assert_eq!(engine.theta_gamma(), 270.0);
        assert_eq!(engine.theta_epsilon(), 180.0);

        // Exactly astern
        let engine = astern_engine();
        assert!(engine.os_on_sternline);
        assert!(engine.os_aft_of_cn);
        assert!(engine.os_port_of_cn && engine.os_star_of_cn);
        assert_eq!(engine.range_gamma(), 0.0);
        assert_eq!(engine.range_epsilon(), 100.0);

        // Exactly abeam to port
        let engine = CpaEngine::new(&Kinematics::new(0.0, 0.0, 0.0, 3.0), -40.0, 0.0);
        assert!(engine.os_on_beam);
        assert_eq!(engine.range_gamma(), 40.0);
        assert_eq!(engine.range_epsilon(), 0.0);
    }

    #[test]
    fn test_negative_contact_speed_clamped() {
        let engine = CpaEngine::new(&Kinematics::new(0.0, 0.0, 0.0, -3.0), 0.0, -100.0);
        assert_eq!(engine.contact_speed(), 0.0);
        let engine = CpaEngine::new(&Kinematics::new(0.0, 0.0, 0.0, f64::NAN), 0.0, -100.0);
        assert_eq!(engine.contact_speed(), 0.0);
    }

    #[test]
    fn test_reset_idempotent() {
        let contact = Kinematics::new(35.0, -12.0, 123.4, 2.7);
        let mut a = CpaEngine::new(&contact, 5.0, 9.0);
        let b = a.clone();
        a.reset(&contact, 5.0, 9.0);
        assert_eq!(a, b);
        for (x, y) in a.k1_cache.as_slice().iter().zip(b.k1_cache.as_slice()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
        for (x, y) in a.vthresh_cache.as_slice().iter().zip(b.vthresh_cache.as_slice()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn test_time_gamma_epsilon() {
        let engine = CpaEngine::new(&Kinematics::new(0.0, 0.0, 0.0, 0.0), 50.0, 50.0);
        // Heading west at 5 reaches the bow-stern line in 10 seconds
        assert!((engine.os_time_gamma(270.0, 5.0) - 10.0).abs() < 1e-9);
        // Heading south at 5 reaches the beam in 10 seconds
        assert!((engine.os_time_epsilon(180.0, 5.0) - 10.0).abs() < 1e-9);
        assert_eq!(engine.os_time_gamma(0.0, 5.0), 0.0);
    }
}
