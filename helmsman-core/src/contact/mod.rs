//! Contact Tracking
//!
//! A [`ContactTracker`] holds everything a contact behavior needs to know
//! about one contact between cycles: the last report, the extrapolator, the
//! filter, the retired-list watch and a short history of bearings. Each
//! cycle it builds a fresh [`CpaEngine`] for the behavior and a
//! [`ContactState`] snapshot of the relative geometry.
//!
//! # Architecture
//!
//! ```text
//! ContactReport ─► extrapolate ─► CpaEngine (contact seen from ownship)
//!                                  CpaEngine (ownship seen from contact)
//!                                        │
//!                                        ▼
//!                    ContactState { relation flags, events, ranges }
//! ```
//!
//! Events compare the new state against the archived previous one, so an
//! event is reported on exactly one cycle.

mod filter;

pub use filter::ContactFilter;

use std::collections::VecDeque;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::config::AvoidCollisionConfig;
use crate::cpa::CpaEngine;
use crate::error::PlatformError;
use crate::extrapolate::LinearExtrapolator;
use crate::geometry::{angle180, closing_speed, rel_bearing, Kinematics};

/// Samples kept for bearing and turn rate estimates
pub const DEFAULT_HISTORY_LEN: usize = 10;

/// Look-ahead used for the current-course CPA in [`ContactState`]
const CURRENT_CPA_HORIZON: f64 = 120.0;

bitflags! {
    /// Where ownship and the contact sit relative to each other, and what
    /// their present courses will do.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Relation: u32 {
        const OS_FORE_OF_CN       = 1 << 0;
        const OS_AFT_OF_CN        = 1 << 1;
        const OS_PORT_OF_CN       = 1 << 2;
        const OS_STAR_OF_CN       = 1 << 3;
        const CN_FORE_OF_OS       = 1 << 4;
        const CN_AFT_OF_OS        = 1 << 5;
        const CN_PORT_OF_OS       = 1 << 6;
        const CN_STAR_OF_OS       = 1 << 7;
        const OS_PASSES_CN        = 1 << 8;
        const OS_PASSES_CN_PORT   = 1 << 9;
        const OS_PASSES_CN_STAR   = 1 << 10;
        const CN_PASSES_OS        = 1 << 11;
        const CN_PASSES_OS_PORT   = 1 << 12;
        const CN_PASSES_OS_STAR   = 1 << 13;
        const OS_CROSSES_CN_BOW   = 1 << 14;
        const OS_CROSSES_CN_STERN = 1 << 15;
        const CN_CROSSES_OS_BOW   = 1 << 16;
        const CN_CROSSES_OS_STERN = 1 << 17;
        const CLOSING             = 1 << 18;
    }
}

bitflags! {
    /// Transitions seen between the previous cycle and this one
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ContactEvents: u8 {
        /// Ownship crossed the contact's bow-stern line ahead of it
        const JUST_CROSSED_BOW   = 1 << 0;
        /// Ownship crossed the contact's bow-stern line behind it
        const JUST_CROSSED_STERN = 1 << 1;
        /// Ownship crossed the contact's beam line on its port side
        const JUST_PASSED_PORT   = 1 << 2;
        /// Ownship crossed the contact's beam line on its starboard side
        const JUST_PASSED_STAR   = 1 << 3;
        /// Range stopped closing
        const CPA_REACHED        = 1 << 4;
    }
}

/// One position report for a named contact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactReport {
    pub name: String,
    #[serde(flatten)]
    pub kinematics: Kinematics,
    pub utc: f64,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub vtype: String,
}

/// Relative geometry of ownship and one contact at one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactState {
    pub time: f64,
    pub ownship: Kinematics,
    /// Contact pose after extrapolation
    pub contact: Kinematics,
    pub range: f64,
    /// Positive when closing
    pub closing_speed: f64,
    /// Range rate for ownship's present heading and speed, positive closing
    pub rate_of_closure: f64,
    /// Contact bearing relative to ownship's bow
    pub os_cn_rel_bearing: f64,
    /// Ownship bearing relative to the contact's bow
    pub cn_os_rel_bearing: f64,
    /// Absolute bearing from ownship to the contact
    pub os_cn_abs_bearing: f64,
    pub cn_speed_in_os_pos: f64,
    pub range_gamma: f64,
    pub range_epsilon: f64,
    pub os_crosses_cn_bow_dist: Option<f64>,
    pub cn_crosses_os_bow_dist: Option<f64>,
    /// CPA if both platforms hold their present course and speed
    pub os_curr_cpa_dist: f64,
    pub relation: Relation,
    pub events: ContactEvents,
}

impl ContactState {
    fn from_engines(
        time: f64,
        ownship: &Kinematics,
        contact: &Kinematics,
        engine: &CpaEngine,
        reverse: &CpaEngine,
    ) -> Self {
        let (osh, osv) = (ownship.heading, ownship.speed);
        let (cnh, cnv) = (engine.contact_heading(), engine.contact_speed());

        let mut relation = Relation::empty();
        let flags = [
            (Relation::OS_FORE_OF_CN, engine.fore_of_contact()),
            (Relation::OS_AFT_OF_CN, engine.aft_of_contact()),
            (Relation::OS_PORT_OF_CN, engine.port_of_contact()),
            (Relation::OS_STAR_OF_CN, engine.starboard_of_contact()),
            (Relation::CN_FORE_OF_OS, reverse.fore_of_contact()),
            (Relation::CN_AFT_OF_OS, reverse.aft_of_contact()),
            (Relation::CN_PORT_OF_OS, reverse.port_of_contact()),
            (Relation::CN_STAR_OF_OS, reverse.starboard_of_contact()),
            (Relation::OS_PASSES_CN, engine.passes_port_or_star(osh, osv)),
            (Relation::OS_PASSES_CN_PORT, engine.passes_port(osh, osv)),
            (Relation::OS_PASSES_CN_STAR, engine.passes_star(osh, osv)),
            (Relation::CN_PASSES_OS, reverse.passes_port_or_star(cnh, cnv)),
            (Relation::CN_PASSES_OS_PORT, reverse.passes_port(cnh, cnv)),
            (Relation::CN_PASSES_OS_STAR, reverse.passes_star(cnh, cnv)),
            (Relation::OS_CROSSES_CN_BOW, engine.crosses_bow(osh, osv)),
            (Relation::OS_CROSSES_CN_STERN, engine.crosses_stern(osh, osv)),
            (Relation::CN_CROSSES_OS_BOW, reverse.crosses_bow(cnh, cnv)),
            (Relation::CN_CROSSES_OS_STERN, reverse.crosses_stern(cnh, cnv)),
        ];
        for (flag, set) in flags {
            relation.set(flag, set);
        }

        let closing = closing_speed(
            ownship.x, ownship.y, osv, osh, contact.x, contact.y, cnv, cnh,
        );
        relation.set(Relation::CLOSING, closing > 0.0);

        ContactState {
            time,
            ownship: *ownship,
            contact: *contact,
            range: engine.range(),
            closing_speed: closing,
            rate_of_closure: engine.eval_roc(osh, osv),
            os_cn_rel_bearing: rel_bearing(ownship.x, ownship.y, osh, contact.x, contact.y),
            cn_os_rel_bearing: rel_bearing(contact.x, contact.y, cnh, ownship.x, ownship.y),
            os_cn_abs_bearing: engine.bearing_ownship_to_contact(),
            cn_speed_in_os_pos: engine.contact_speed_toward_ownship(),
            range_gamma: engine.range_gamma(),
            range_epsilon: engine.range_epsilon(),
            os_crosses_cn_bow_dist: engine.crosses_bow_dist(osh, osv),
            cn_crosses_os_bow_dist: reverse.crosses_bow_dist(cnh, cnv),
            os_curr_cpa_dist: engine.eval_cpa(osh, osv, CURRENT_CPA_HORIZON),
            relation,
            events: ContactEvents::empty(),
        }
    }

    /// Ownship strictly on one side of the contact's bow-stern line:
    /// `Some(true)` port, `Some(false)` starboard
    fn strict_side(&self) -> Option<bool> {
        let port = self.relation.contains(Relation::OS_PORT_OF_CN);
        let star = self.relation.contains(Relation::OS_STAR_OF_CN);
        match (port, star) {
            (true, false) => Some(true),
            (false, true) => Some(false),
            _ => None,
        }
    }

    /// Ownship strictly ahead of (`Some(true)`) or behind the contact's beam
    fn strict_fore(&self) -> Option<bool> {
        let fore = self.relation.contains(Relation::OS_FORE_OF_CN);
        let aft = self.relation.contains(Relation::OS_AFT_OF_CN);
        match (fore, aft) {
            (true, false) => Some(true),
            (false, true) => Some(false),
            _ => None,
        }
    }

    /// Events implied by moving from `prev` to `self`
    fn events_since(&self, prev: &ContactState) -> ContactEvents {
        let mut events = ContactEvents::empty();

        if let (Some(was_port), Some(is_port)) = (prev.strict_side(), self.strict_side()) {
            if was_port != is_port {
                match self.strict_fore().or(prev.strict_fore()) {
                    Some(true) => events |= ContactEvents::JUST_CROSSED_BOW,
                    Some(false) => events |= ContactEvents::JUST_CROSSED_STERN,
                    None => {}
                }
            }
        }

        if let (Some(was_fore), Some(is_fore)) = (prev.strict_fore(), self.strict_fore()) {
            if was_fore != is_fore {
                match self.strict_side().or(prev.strict_side()) {
                    Some(true) => events |= ContactEvents::JUST_PASSED_PORT,
                    Some(false) => events |= ContactEvents::JUST_PASSED_STAR,
                    None => {}
                }
            }
        }

        if prev.closing_speed > 0.0 && self.closing_speed <= 0.0 {
            events |= ContactEvents::CPA_REACHED;
        }
        events
    }
}

/// One entry of the rolling bearing history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BearingSample {
    pub time: f64,
    /// Absolute bearing ownship to contact
    pub bearing: f64,
    pub contact_heading: f64,
}

/// Per-contact state carried across cycles
#[derive(Debug, Clone)]
pub struct ContactTracker {
    name: String,
    filter: ContactFilter,
    extrapolator: LinearExtrapolator,
    extrapolate: bool,
    max_age: Option<f64>,
    complete_after_retired: Option<f64>,
    not_retired_since: Option<f64>,
    retired: bool,
    group: String,
    vtype: String,
    state: Option<ContactState>,
    previous: Option<ContactState>,
    history: VecDeque<BearingSample>,
    history_len: usize,
}

impl ContactTracker {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.trim().to_uppercase(),
            filter: ContactFilter::default(),
            extrapolator: LinearExtrapolator::new(),
            extrapolate: true,
            max_age: None,
            complete_after_retired: None,
            not_retired_since: None,
            retired: false,
            group: String::new(),
            vtype: String::new(),
            state: None,
            previous: None,
            history: VecDeque::with_capacity(DEFAULT_HISTORY_LEN),
            history_len: DEFAULT_HISTORY_LEN,
        }
    }

    pub fn with_filter(mut self, filter: ContactFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_extrapolator(mut self, enabled: bool, extrapolator: LinearExtrapolator) -> Self {
        self.extrapolate = enabled;
        self.extrapolator = extrapolator;
        self
    }

    pub fn with_max_age(mut self, max_age: Option<f64>) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_complete_after_retired(mut self, secs: Option<f64>) -> Self {
        self.complete_after_retired = secs;
        self
    }

    pub fn with_history_len(mut self, len: usize) -> Self {
        self.history_len = len.max(2);
        self
    }

    /// Pick up contact-related options. A change of contact name starts
    /// the tracker afresh.
    pub fn configure(&mut self, config: &AvoidCollisionConfig) {
        let name = config.contact.trim().to_uppercase();
        if name != self.name {
            *self = ContactTracker::new(&name).with_history_len(self.history_len);
        }
        self.filter = config.filter.clone();
        self.extrapolate = config.extrapolate;
        if let Err(e) = self.extrapolator.set_decay(config.decay_start, config.decay_end) {
            log::warn!("{}: {}", self.name, e);
        }
        self.max_age = config.max_contact_age;
        self.complete_after_retired = config.complete_after_retired;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> Option<&ContactState> {
        self.state.as_ref()
    }

    pub fn previous(&self) -> Option<&ContactState> {
        self.previous.as_ref()
    }

    pub fn history(&self) -> impl Iterator<Item = &BearingSample> {
        self.history.iter()
    }

    /// Refresh from this cycle's ownship pose and contact report. Returns
    /// the engine for the cycle; the snapshot is available from
    /// [`ContactTracker::state`]. On error the previous state is kept.
    pub fn update(
        &mut self,
        time: f64,
        ownship: Option<&Kinematics>,
        report: Option<&ContactReport>,
    ) -> Result<CpaEngine, PlatformError> {
        if self.name.is_empty() {
            return Err(PlatformError::NoContactName);
        }
        let ownship = match ownship {
            Some(os) if os.is_finite() => os,
            _ => return Err(PlatformError::OwnshipUnavailable),
        };
        let report = match report {
            Some(r) if r.kinematics.is_finite() => r,
            _ => return Err(PlatformError::ContactUnavailable(self.name.clone())),
        };
        if let Some(max_age) = self.max_age {
            let age = time - report.utc;
            if age > max_age {
                return Err(PlatformError::StaleContact {
                    name: self.name.clone(),
                    age,
                });
            }
        }

        self.group = report.group.clone();
        self.vtype = report.vtype.clone();

        let mut contact = report.kinematics;
        if self.extrapolate {
            self.extrapolator.set_position(report.kinematics, report.utc);
            match self.extrapolator.position(time) {
                Ok((x, y)) => {
                    contact.x = x;
                    contact.y = y;
                }
                Err(e) => log::warn!("{}: incomplete linear extrapolation: {}", self.name, e),
            }
        }

        let engine = CpaEngine::new(&contact, ownship.x, ownship.y);
        let reverse = CpaEngine::new(ownship, contact.x, contact.y);
        let mut state = ContactState::from_engines(time, ownship, &contact, &engine, &reverse);
        if let Some(prev) = &self.state {
            state.events = state.events_since(prev);
        }
        if !state.events.is_empty() {
            log::debug!("{}: events {:?}", self.name, state.events);
        }

        self.push_sample(BearingSample {
            time,
            bearing: state.os_cn_abs_bearing,
            contact_heading: state.contact.heading,
        });
        self.previous = self.state.replace(state);
        Ok(engine)
    }

    fn push_sample(&mut self, sample: BearingSample) {
        if let Some(last) = self.history.back() {
            if sample.time <= last.time {
                return;
            }
        }
        if self.history.len() >= self.history_len {
            self.history.pop_front();
        }
        self.history.push_back(sample);
    }

    /// Average signed rate over the history window, degrees per second
    fn history_rate(&self, value: impl Fn(&BearingSample) -> f64) -> Option<f64> {
        let first = self.history.front()?;
        let last = self.history.back()?;
        let dt = last.time - first.time;
        if dt <= 0.0 {
            return None;
        }
        let mut total = 0.0;
        let mut prev = first;
        for sample in self.history.iter().skip(1) {
            total += angle180(value(sample) - value(prev));
            prev = sample;
        }
        Some(total / dt)
    }

    /// Observed bearing rate, positive when the bearing drifts clockwise
    pub fn observed_bearing_rate(&self) -> Option<f64> {
        self.history_rate(|s| s.bearing)
    }

    /// Observed contact turn rate, positive to starboard
    pub fn contact_turn_rate(&self) -> Option<f64> {
        self.history_rate(|s| s.contact_heading)
    }

    /// True if the contact's last reported group and type pass the filter
    pub fn filter_check_holds(&self) -> bool {
        self.filter.check(&self.group, &self.vtype)
    }

    /// Watch the host's retired-contacts list. The contact counts as
    /// retired once it has stayed on the list longer than configured.
    pub fn note_retired_list(&mut self, time: f64, retired: &[String]) -> bool {
        let Some(limit) = self.complete_after_retired else {
            return false;
        };
        let listed = retired.iter().any(|n| n.trim().eq_ignore_ascii_case(&self.name));
        if !listed {
            self.not_retired_since = Some(time);
            self.retired = false;
        } else {
            let since = *self.not_retired_since.get_or_insert(time);
            if time - since > limit {
                self.retired = true;
            }
        }
        self.retired
    }

    pub fn retired(&self) -> bool {
        self.retired
    }
}
