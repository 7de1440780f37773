//! Helmsman Sim
//!
//! Scenario runner hosting the collision avoidance core. It plays the part
//! of the arbitration runtime: one behavior per contact, weighted-sum helm,
//! straight-line platform motion.
//!
//! # Example
//!
//! ```rust,ignore
//! use helmsman_sim::{Scenario, Simulation};
//!
//! let scenario = Scenario::load(Path::new("scenarios/head_on.json"))?;
//! let mut sim = Simulation::new(&scenario)?;
//! let summary = sim.run(|record| println!("{:?}", record.decision));
//! ```

pub mod helm;
pub mod scenario;
pub mod sim;

pub use scenario::{Scenario, ScenarioError};
pub use sim::{CycleRecord, Outcome, RunSummary, Simulation};
