//! Scenario playback
//!
//! # Architecture
//!
//! ```text
//!  for each cycle:
//!    contacts ──report──► AvoidCollision (one per contact) ──┐
//!                                                            ├─► helm::decide ─► ownship
//!    ownship cruise ──────► CruiseObjective ─────────────────┘
//!    advance every platform by dt
//! ```
//!
//! Behaviors see the contact only through its latest report, so a contact
//! reporting every few cycles exercises the core's extrapolation.

use helmsman_core::behavior::{AvoidCollision, AvoidMode, CycleInput};
use helmsman_core::contact::ContactReport;
use helmsman_core::domain::DecisionDomain;
use helmsman_core::{Kinematics, PreferenceFunction};
use serde::{Deserialize, Serialize};

use crate::helm::{self, CruiseObjective, HelmDecision};
use crate::scenario::{ContactConfig, Scenario, ScenarioError};

/// How close a contact came, judged against its behavior's distances
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Outcome {
    /// Closest range never fell below the max utility CPA distance
    Clear,
    /// Inside the max utility distance but outside the min utility distance
    CloseQuarters,
    /// Inside the min utility distance
    Collision,
}

impl Default for Outcome {
    fn default() -> Self {
        Outcome::Clear
    }
}

/// Per-contact line of a cycle record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub name: String,
    pub range: f64,
    pub mode: AvoidMode,
    pub relevance: f64,
    pub avoiding: bool,
    pub total_evals: usize,
    pub postings: Vec<(String, String)>,
}

/// Everything that happened in one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub cycle: usize,
    pub time: f64,
    pub ownship: Kinematics,
    pub decision: Option<HelmDecision>,
    pub contacts: Vec<ContactRecord>,
}

/// Closest approach to one contact over the whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactSummary {
    pub name: String,
    pub min_range: f64,
    pub min_range_time: f64,
    pub outcome: Outcome,
    pub final_mode: AvoidMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub scenario: String,
    pub cycles: usize,
    pub duration: f64,
    pub contacts: Vec<ContactSummary>,
}

struct SimContact {
    setup: ContactConfig,
    kinematics: Kinematics,
    report: Option<ContactReport>,
    behavior: AvoidCollision,
    min_range: f64,
    min_range_time: f64,
}

impl SimContact {
    fn outcome(&self) -> Outcome {
        let config = self.behavior.config();
        if self.min_range < config.min_util_cpa_dist {
            Outcome::Collision
        } else if self.min_range < config.max_util_cpa_dist {
            Outcome::CloseQuarters
        } else {
            Outcome::Clear
        }
    }
}

/// A scenario being played back cycle by cycle
pub struct Simulation {
    name: String,
    dt: f64,
    steps: usize,
    cycle: usize,
    time: f64,
    domain: DecisionDomain,
    ownship: Kinematics,
    cruise_heading: f64,
    cruise_speed: f64,
    cruise_priority: f64,
    contacts: Vec<SimContact>,
    retired: Vec<String>,
}

impl Simulation {
    pub fn new(scenario: &Scenario) -> Result<Self, ScenarioError> {
        scenario.validate()?;
        let domain = scenario.domain.build()?;
        let mut contacts = Vec::with_capacity(scenario.contacts.len());
        for setup in &scenario.contacts {
            let config = scenario.behavior_for(setup)?;
            let behavior =
                AvoidCollision::new(config, domain.clone()).map_err(|source| {
                    ScenarioError::Config {
                        contact: setup.name.clone(),
                        source,
                    }
                })?;
            log::debug!(
                "{}: strategy {}, completion range {:.1}",
                setup.name,
                behavior.strategy(),
                behavior.completion_range()
            );
            contacts.push(SimContact {
                setup: setup.clone(),
                kinematics: setup.start,
                report: None,
                behavior,
                min_range: f64::INFINITY,
                min_range_time: 0.0,
            });
        }
        Ok(Self {
            name: scenario.name.clone(),
            dt: scenario.dt,
            steps: scenario.steps,
            cycle: 0,
            time: 0.0,
            domain,
            ownship: scenario.ownship.start,
            cruise_heading: scenario.ownship.cruise_heading(),
            cruise_speed: scenario.ownship.cruise_speed(),
            cruise_priority: scenario.ownship.cruise_priority,
            contacts,
            retired: Vec::new(),
        })
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn ownship(&self) -> &Kinematics {
        &self.ownship
    }

    pub fn is_finished(&self) -> bool {
        self.cycle >= self.steps
    }

    /// Current mode of the behavior watching `name`
    pub fn mode_of(&self, name: &str) -> Option<AvoidMode> {
        self.contacts
            .iter()
            .find(|c| c.setup.name.eq_ignore_ascii_case(name))
            .map(|c| c.behavior.mode())
    }

    /// Run one cycle and advance every platform
    pub fn step(&mut self) -> CycleRecord {
        let time = self.time;

        for contact in &mut self.contacts {
            if self.cycle % contact.setup.report_every == 0 {
                contact.report = Some(contact.setup.report(contact.kinematics, time));
            }
            if let Some(at) = contact.setup.retire_at {
                if time >= at && !self.retired.iter().any(|n| n == &contact.setup.name) {
                    log::info!("{}: retired at {:.1}", contact.setup.name, time);
                    self.retired.push(contact.setup.name.clone());
                }
            }
        }

        let mut functions: Vec<PreferenceFunction> = Vec::new();
        let mut records = Vec::with_capacity(self.contacts.len());
        for contact in &mut self.contacts {
            let before = contact.behavior.mode();
            let input = CycleInput {
                time,
                ownship: Some(&self.ownship),
                contact: contact.report.as_ref(),
                retired: &self.retired,
            };
            if let Some(ipf) = contact.behavior.run_cycle(input) {
                functions.push(ipf);
            }
            let status = contact.behavior.status();
            if status.mode != before {
                log::info!(
                    "{}: {} -> {} at {:.1} (range {:.1})",
                    contact.setup.name,
                    before,
                    status.mode,
                    time,
                    status.range
                );
            }

            let range = self.ownship.range_to(&contact.kinematics);
            if range < contact.min_range {
                contact.min_range = range;
                contact.min_range_time = time;
            }
            records.push(ContactRecord {
                name: contact.setup.name.clone(),
                range,
                mode: status.mode,
                relevance: status.relevance,
                avoiding: status.avoiding,
                total_evals: status.total_evals,
                postings: status.postings(&contact.behavior.config().contact),
            });
        }

        let decision = if functions.is_empty() {
            None
        } else {
            functions.push(
                CruiseObjective::new(&self.domain, self.cruise_heading, self.cruise_speed)
                    .build(self.cruise_priority),
            );
            helm::decide(&functions)
        };
        match &decision {
            Some(d) => {
                log::debug!(
                    "t={:.1} helm course {:.0} speed {:.2} from {} functions",
                    time,
                    d.course,
                    d.speed,
                    functions.len()
                );
                self.ownship.heading = d.course;
                self.ownship.speed = d.speed;
            }
            None => {
                self.ownship.heading = self.cruise_heading;
                self.ownship.speed = self.cruise_speed;
            }
        }

        let record = CycleRecord {
            cycle: self.cycle,
            time,
            ownship: self.ownship,
            decision,
            contacts: records,
        };

        self.ownship = helm::advance(&self.ownship, self.dt);
        for contact in &mut self.contacts {
            contact.kinematics = helm::advance(&contact.kinematics, self.dt);
        }
        self.cycle += 1;
        self.time += self.dt;
        record
    }

    /// Play the remaining cycles, handing each record to `on_cycle`
    pub fn run<F>(&mut self, mut on_cycle: F) -> RunSummary
    where
        F: FnMut(&CycleRecord),
    {
        while !self.is_finished() {
            let record = self.step();
            on_cycle(&record);
        }
        self.summary()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            scenario: self.name.clone(),
            cycles: self.cycle,
            duration: self.time,
            contacts: self
                .contacts
                .iter()
                .map(|c| ContactSummary {
                    name: c.setup.name.clone(),
                    min_range: c.min_range,
                    min_range_time: c.min_range_time,
                    outcome: c.outcome(),
                    final_mode: c.behavior.mode(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(json: &str) -> Scenario {
        Scenario::from_json(json).unwrap()
    }

    const HEAD_ON: &str = r#"{
        "name": "head_on",
        "dt": 1.0,
        "steps": 400,
        "ownship": { "x": 0, "y": 0, "heading": 0, "speed": 2 },
        "contacts": [
            { "name": "henry", "x": 0, "y": 500, "heading": 180, "speed": 2 }
        ],
        "domain": { "course_points": 72, "max_speed": 3, "speed_points": 7 },
        "behavior": { "pwt_outer_dist": 250, "pwt_inner_dist": 100,
                      "completed_dist": 600, "max_util_cpa_dist": 60,
                      "use_refinery": true }
    }"#;

    #[test]
    fn test_no_contacts_holds_cruise() {
        let mut sim = Simulation::new(&scenario(
            r#"{ "steps": 10, "ownship": { "x": 0, "y": 0, "heading": 90, "speed": 2 } }"#,
        ))
        .unwrap();
        let summary = sim.run(|record| assert!(record.decision.is_none()));
        assert_eq!(summary.cycles, 10);
        assert!((sim.ownship().x - 20.0).abs() < 1e-9);
        assert_eq!(sim.ownship().heading, 90.0);
    }

    #[test]
    fn test_head_on_is_avoided() {
        let mut sim = Simulation::new(&scenario(HEAD_ON)).unwrap();
        let mut avoided = false;
        let summary = sim.run(|record| avoided |= record.decision.is_some());
        assert!(avoided);
        let henry = &summary.contacts[0];
        // Unavoided, the two would have met at range zero
        assert!(henry.min_range > 10.0, "min range {}", henry.min_range);
        assert_ne!(henry.outcome, Outcome::Collision);
        assert_eq!(henry.final_mode, AvoidMode::Complete);
    }

    #[test]
    fn test_records_postings() {
        let mut sim = Simulation::new(&scenario(HEAD_ON)).unwrap();
        let record = sim.step();
        assert_eq!(record.cycle, 0);
        assert_eq!(record.contacts.len(), 1);
        let henry = &record.contacts[0];
        assert!((henry.range - 500.0).abs() < 1e-9);
        assert_eq!(henry.mode, AvoidMode::Idle);
        assert!(henry
            .postings
            .iter()
            .any(|(k, v)| k == "RANGE_AVD_HENRY" && v == "500.0"));
        assert_eq!(sim.time(), 1.0);
    }

    #[test]
    fn test_retired_contact_completes() {
        let mut s = scenario(HEAD_ON);
        s.contacts[0].retire_at = Some(3.0);
        s.contacts[0]
            .params
            .insert("complete_after_retired".to_string(), "0".to_string());
        let mut sim = Simulation::new(&s).unwrap();
        for _ in 0..5 {
            sim.step();
        }
        assert_eq!(sim.mode_of("HENRY"), Some(AvoidMode::Complete));
    }

    #[test]
    fn test_sparse_reports_still_avoid() {
        let mut s = scenario(HEAD_ON);
        s.contacts[0].report_every = 5;
        let mut sim = Simulation::new(&s).unwrap();
        let summary = sim.run(|_| {});
        assert!(summary.contacts[0].min_range > 10.0);
    }

    #[test]
    fn test_bad_contact_param_fails() {
        let mut s = scenario(HEAD_ON);
        s.contacts[0]
            .params
            .insert("pwt_grade".to_string(), "cubic".to_string());
        assert!(matches!(
            Simulation::new(&s),
            Err(ScenarioError::Config { .. })
        ));
    }
}
