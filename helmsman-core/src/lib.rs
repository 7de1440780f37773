//! Helmsman Core
//!
//! Platform-independent collision avoidance decision core for an autonomous
//! vessel's helm. Given ownship and contact kinematics it predicts the
//! closest point of approach for any candidate course and speed, certifies
//! regions of the decision grid as safe, and produces a weighted preference
//! function over course and speed for an external arbitration runtime.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        helmsman-core                          │
//! │                                                              │
//! │  geometry ─► cpa::CpaEngine ─► refinery ─► objective          │
//! │                    ▲                          │               │
//! │  contact::ContactTracker ◄── behavior::AvoidCollision         │
//! │        (extrapolate)             (config)                     │
//! └──────────────────────────────────────────────────────────────┘
//!                  ▲                         │
//!          ownship + contact          PreferenceFunction
//!            each cycle               + BehaviorStatus
//!                  │                         ▼
//!          ┌───────────────────────────────────────┐
//!          │  Host (helmsman-sim, or a real helm)  │
//!          └───────────────────────────────────────┘
//! ```
//!
//! Everything here is synchronous and allocation-light: no I/O, no
//! threads, no global state. A [`cpa::CpaEngine`] is built per cycle and
//! dropped at the end of it.
//!
//! # Example
//!
//! ```rust,ignore
//! use helmsman_core::behavior::{AvoidCollision, CycleInput};
//! use helmsman_core::config::AvoidCollisionConfig;
//! use helmsman_core::domain::DecisionDomain;
//!
//! let mut config = AvoidCollisionConfig::default();
//! config.set_param("contact", "henry")?;
//! let domain = DecisionDomain::course_speed(360, 5.0, 26)?;
//! let mut behavior = AvoidCollision::new(config, domain)?;
//!
//! let input = CycleInput { time, ownship: Some(&ownship), contact: Some(&report), retired: &[] };
//! if let Some(ipf) = behavior.run_cycle(input) {
//!     let best = ipf.best_cell();
//! }
//! ```

pub mod behavior;
pub mod config;
pub mod contact;
pub mod cpa;
pub mod domain;
pub mod error;
pub mod extrapolate;
pub mod geometry;
pub mod objective;
pub mod refinery;

pub use behavior::{AvoidCollision, AvoidMode, BehaviorStatus, CycleInput};
pub use config::AvoidCollisionConfig;
pub use cpa::CpaEngine;
pub use domain::DecisionDomain;
pub use geometry::Kinematics;
pub use objective::PreferenceFunction;
