//! Crossing and passing predicates.
//!
//! "Crossing" means ownship crosses the contact's bow-stern line, ahead of
//! the contact (bow) or behind it (stern). "Passing" means ownship crosses
//! the contact's beam line, on the contact's port or starboard side.
//!
//! Ownship sitting exactly on one of those lines, or on the contact itself,
//! is answered from fixed branches rather than by dividing by a zero
//! distance or speed. A platform on top of the contact crosses and passes
//! nothing.

use super::engine::CpaEngine;

impl CpaEngine {
    /// Ownship is presently ahead of the contact's beam line
    pub fn fore_of_contact(&self) -> bool {
        self.os_fore_of_cn
    }

    /// Ownship is presently behind the contact's beam line
    pub fn aft_of_contact(&self) -> bool {
        self.os_aft_of_cn
    }

    /// Ownship is presently on the contact's port side (or on its bow-stern line)
    pub fn port_of_contact(&self) -> bool {
        self.os_port_of_cn
    }

    /// Ownship is presently on the contact's starboard side (or on its bow-stern line)
    pub fn starboard_of_contact(&self) -> bool {
        self.os_star_of_cn
    }

    pub fn on_contact(&self) -> bool {
        self.os_on_contact
    }

    pub fn on_bowline(&self) -> bool {
        self.os_on_bowline
    }

    pub fn on_sternline(&self) -> bool {
        self.os_on_sternline
    }

    pub fn on_bow_stern_line(&self) -> bool {
        self.os_on_bowline || self.os_on_sternline
    }

    pub fn on_beam(&self) -> bool {
        self.os_on_beam
    }

    // =========================================================================
    // Bow / stern crossings
    // =========================================================================

    /// Will ownship cross ahead of the contact on this heading and speed?
    pub fn crosses_bow(&self, osh: f64, osv: f64) -> bool {
        if self.os_on_contact {
            return false;
        }
        if self.os_on_sternline {
            return true;
        }
        if osv <= 0.0 {
            return false;
        }
        if self.os_gam_cos_cache.get(osh) <= 0.0 {
            return false;
        }
        let bng_rate = self.bearing_rate(osh, osv);
        if self.os_port_of_cn {
            bng_rate >= 0.0
        } else {
            bng_rate <= 0.0
        }
    }

    /// Will ownship cross behind the contact on this heading and speed?
    pub fn crosses_stern(&self, osh: f64, osv: f64) -> bool {
        if self.os_on_contact {
            return false;
        }
        if self.os_on_sternline {
            return true;
        }
        if osv <= 0.0 {
            return false;
        }
        if self.os_gam_cos_cache.get(osh) <= 0.0 {
            return false;
        }
        let bng_rate = self.bearing_rate(osh, osv);
        if self.os_port_of_cn {
            bng_rate <= 0.0
        } else {
            bng_rate >= 0.0
        }
    }

    /// Will ownship cross the contact's bow-stern line at all?
    pub fn crosses_bow_or_stern(&self, osh: f64, osv: f64) -> bool {
        if self.os_on_contact {
            return false;
        }
        if self.on_bow_stern_line() {
            return true;
        }
        if osv <= 0.0 {
            return false;
        }
        self.os_gam_cos_cache.get(osh) > 0.00001
    }

    /// Distance ahead of the contact at which ownship crosses its bow,
    /// or `None` if it does not cross the bow.
    pub fn crosses_bow_dist(&self, osh: f64, osv: f64) -> Option<f64> {
        if self.os_on_bowline {
            return Some(self.stat_range);
        }
        if self.os_on_sternline || self.os_on_contact {
            return None;
        }

        let speed_os_gam = self.os_gam_cos_cache.get(osh) * osv;
        if speed_os_gam <= 0.0 {
            return None;
        }
        let time_os_gam = self.range_gam / speed_os_gam;

        // Along-track travel of each platform until ownship reaches the line
        let range_xcn_eps = time_os_gam * self.cnv;
        let range_xos_eps = time_os_gam * self.os_cnh_cos_cache.get(osh) * osv;

        let mut xdist = range_xos_eps - range_xcn_eps;
        if self.os_fore_of_cn {
            xdist += self.range_eps;
        } else {
            xdist -= self.range_eps;
        }
        positive(xdist)
    }

    /// Distance behind the contact at which ownship crosses its stern,
    /// or `None` if it does not cross the stern.
    pub fn crosses_stern_dist(&self, osh: f64, osv: f64) -> Option<f64> {
        if self.os_on_sternline {
            return Some(self.stat_range);
        }
        if self.os_on_bowline || self.os_on_contact {
            return None;
        }

        let speed_os_gam = self.os_gam_cos_cache.get(osh) * osv;
        if speed_os_gam <= 0.0 {
            return None;
        }
        let time_os_gam = self.range_gam / speed_os_gam;

        let range_xcn_eps = time_os_gam * self.cnv;
        let range_xos_eps = time_os_gam * self.os_cnh_cos_cache.get(osh) * osv;

        let mut xdist = range_xcn_eps;
        if self.os_fore_of_cn {
            xdist -= self.range_eps;
        } else {
            xdist += self.range_eps;
        }
        xdist -= range_xos_eps;
        positive(xdist)
    }

    // =========================================================================
    // Port / starboard passes
    // =========================================================================

    /// Will ownship cross the contact's beam line at all?
    pub fn passes_port_or_star(&self, osh: f64, osv: f64) -> bool {
        if self.os_on_contact {
            return false;
        }
        if self.os_on_beam {
            return true;
        }
        self.os_speed_epsilon(osh, osv) > 0.0
    }

    /// Will ownship pass the contact down its port side?
    pub fn passes_port(&self, osh: f64, osv: f64) -> bool {
        if self.os_on_contact {
            return false;
        }
        if !self.passes_port_or_star(osh, osv) {
            return false;
        }
        if self.os_on_beam {
            return self.os_port_of_cn;
        }
        if self.os_aft_of_cn {
            self.bearing_rate(osh, osv) > 0.0
        } else {
            self.bearing_rate(osh, osv) < 0.0
        }
    }

    /// Will ownship pass the contact down its starboard side?
    pub fn passes_star(&self, osh: f64, osv: f64) -> bool {
        if self.os_on_contact {
            return false;
        }
        if !self.passes_port_or_star(osh, osv) {
            return false;
        }
        !self.passes_port(osh, osv)
    }

    /// Distance off the contact's port side when ownship crosses its beam,
    /// or `None` if ownship does not pass to port.
    pub fn passes_port_dist(&self, osh: f64, osv: f64) -> Option<f64> {
        if self.os_on_contact {
            return None;
        }
        if self.os_on_beam && self.os_star_of_cn {
            return None;
        }
        if self.os_on_beam && self.os_port_of_cn {
            return Some(self.stat_range);
        }

        let gam_dist = self.gamma_travel_to_beam(osh, osv)?;

        // Already to port and not crossing the bow-stern line before the beam
        if self.os_port_of_cn && gam_dist <= self.range_gam {
            return positive(self.range_gam - gam_dist);
        }
        // Starboard now, crossing over to port before reaching the beam
        if self.os_star_of_cn && gam_dist > self.range_gam {
            return positive(gam_dist - self.range_gam);
        }
        None
    }

    /// Distance off the contact's starboard side when ownship crosses its
    /// beam, or `None` if ownship does not pass to starboard.
    pub fn passes_star_dist(&self, osh: f64, osv: f64) -> Option<f64> {
        if self.os_on_contact {
            return None;
        }
        if self.os_on_beam && self.os_port_of_cn {
            return None;
        }
        if self.os_on_beam && self.os_star_of_cn {
            return Some(self.stat_range);
        }

        let gam_dist = self.gamma_travel_to_beam(osh, osv)?;

        if self.os_star_of_cn && gam_dist <= self.range_gam {
            return positive(self.range_gam - gam_dist);
        }
        if self.os_port_of_cn && gam_dist > self.range_gam {
            return positive(gam_dist - self.range_gam);
        }
        None
    }

    /// Distance ownship travels toward the bow-stern line by the time it
    /// reaches the beam. `None` if it never reaches the beam.
    fn gamma_travel_to_beam(&self, osh: f64, osv: f64) -> Option<f64> {
        let v_os_eps = self.os_speed_epsilon(osh, osv);
        if v_os_eps <= 0.0 {
            return None;
        }
        let time_os_eps = self.range_eps / v_os_eps;
        Some(time_os_eps * self.os_gam_cos_cache.get(osh) * osv)
    }
}

#[inline]
fn positive(xdist: f64) -> Option<f64> {
    if xdist > 0.0 {
        Some(xdist)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use crate::cpa::CpaEngine;
    use crate::geometry::Kinematics;

    /// Contact at the origin heading north at 2, ownship 100m east and 100m
    /// north (fore and starboard of the contact).
    fn fore_star_engine() -> CpaEngine {
        CpaEngine::new(&Kinematics::new(0.0, 0.0, 0.0, 2.0), 100.0, 100.0)
    }

    #[test]
    fn test_coincident_predicates_all_false() {
        let engine = CpaEngine::new(&Kinematics::new(10.0, 10.0, 0.0, 3.0), 10.0, 10.0);
        assert!(engine.on_contact());
        assert!(!engine.fore_of_contact());
        assert!(!engine.aft_of_contact());
        assert!(!engine.port_of_contact());
        assert!(!engine.starboard_of_contact());
        assert!(!engine.on_bowline());
        for h in (0..360).step_by(15) {
            let h = h as f64;
            assert!(!engine.crosses_bow(h, 4.0));
            assert!(!engine.crosses_stern(h, 4.0));
            assert!(!engine.crosses_bow_or_stern(h, 4.0));
            assert!(!engine.passes_port(h, 4.0));
            assert!(!engine.passes_star(h, 4.0));
            assert!(!engine.passes_port_or_star(h, 4.0));
            assert_eq!(engine.crosses_bow_dist(h, 4.0), None);
            assert_eq!(engine.crosses_stern_dist(h, 4.0), None);
            assert_eq!(engine.passes_port_dist(h, 4.0), None);
            assert_eq!(engine.passes_star_dist(h, 4.0), None);
            assert_eq!(engine.bearing_rate(h, 4.0), 0.0);
        }
    }

    #[test]
    fn test_crosses_bow_heading_west_fast() {
        let engine = fore_star_engine();
        // Heading west at 10: reaches the bow-stern line in 10s while the
        // contact advances 20m, so ownship crosses 80m ahead.
        assert!(engine.crosses_bow(270.0, 10.0));
        assert!(!engine.crosses_stern(270.0, 10.0));
        let xdist = engine.crosses_bow_dist(270.0, 10.0).unwrap();
        assert!((xdist - 80.0).abs() < 1e-6, "xdist {}", xdist);
        assert_eq!(engine.crosses_stern_dist(270.0, 10.0), None);
    }

    #[test]
    fn test_crosses_stern_heading_south_west() {
        let engine = fore_star_engine();
        // Heading 225 at 1: slow and falling back, crosses behind
        assert!(engine.crosses_stern(225.0, 1.0));
        assert!(!engine.crosses_bow(225.0, 1.0));
        let xdist = engine.crosses_stern_dist(225.0, 1.0).unwrap();
        assert!(xdist > 0.0);
    }

    #[test]
    fn test_no_crossing_heading_away() {
        let engine = fore_star_engine();
        assert!(!engine.crosses_bow(90.0, 5.0));
        assert!(!engine.crosses_stern(90.0, 5.0));
        assert!(!engine.crosses_bow_or_stern(90.0, 5.0));
        assert!(!engine.crosses_bow_or_stern(270.0, 0.0));
        assert!(engine.crosses_bow_or_stern(270.0, 5.0));
    }

    #[test]
    fn test_passes_star_when_staying_starboard() {
        let engine = fore_star_engine();
        // Heading south at 3: stays 100m to starboard while passing the beam
        assert!(engine.passes_port_or_star(180.0, 3.0));
        assert!(engine.passes_star(180.0, 3.0));
        assert!(!engine.passes_port(180.0, 3.0));
        let d = engine.passes_star_dist(180.0, 3.0).unwrap();
        assert!((d - 100.0).abs() < 1e-6, "d {}", d);
        assert_eq!(engine.passes_port_dist(180.0, 3.0), None);
    }

    #[test]
    fn test_no_pass_when_outrunning() {
        let engine = fore_star_engine();
        // Heading north faster than the contact never reaches its beam
        assert!(!engine.passes_port_or_star(0.0, 3.0));
        assert!(!engine.passes_port(0.0, 3.0));
        assert!(!engine.passes_star(0.0, 3.0));
        assert_eq!(engine.passes_star_dist(0.0, 3.0), None);
    }

    #[test]
    fn test_sternline_degenerate() {
        let engine = CpaEngine::new(&Kinematics::new(0.0, 0.0, 0.0, 5.0), 0.0, -100.0);
        assert!(engine.on_sternline());
        assert!(engine.crosses_stern(90.0, 1.0));
        assert!(engine.crosses_bow(90.0, 1.0));
        assert!(engine.crosses_bow_or_stern(90.0, 0.0));
        assert_eq!(engine.crosses_stern_dist(90.0, 1.0), Some(100.0));
        assert_eq!(engine.crosses_bow_dist(90.0, 1.0), None);
    }

    #[test]
    fn test_beam_degenerate() {
        // Ownship exactly abeam to port
        let engine = CpaEngine::new(&Kinematics::new(0.0, 0.0, 0.0, 3.0), -40.0, 0.0);
        assert!(engine.on_beam());
        assert!(engine.passes_port_or_star(0.0, 0.0));
        assert!(engine.passes_port(0.0, 0.0));
        assert!(!engine.passes_star(0.0, 0.0));
        assert_eq!(engine.passes_port_dist(0.0, 0.0), Some(40.0));
        assert_eq!(engine.passes_star_dist(0.0, 0.0), None);
    }

    #[test]
    fn test_ownship_speed_components() {
        let engine = fore_star_engine();
        assert!((engine.os_speed_in_cn_heading(0.0, 4.0) - 4.0).abs() < 1e-9);
        assert!((engine.os_speed_gamma(270.0, 4.0) - 4.0).abs() < 1e-9);
        // Fore of contact: epsilon speed is contact speed minus ownship's along-track
        assert!((engine.os_speed_epsilon(0.0, 1.0) - 1.0).abs() < 1e-9);
        assert!((engine.os_speed_epsilon(180.0, 1.0) - 3.0).abs() < 1e-9);
    }
}
