//! Closest Point of Approach (CPA) Engine
//!
//! Turns a contact snapshot and ownship's position into constant-time
//! queries over candidate ownship maneuvers: CPA distance and time, rate of
//! closure, bearing rate, and crossing/passing predicates.
//!
//! # Architecture
//!
//! - **tables**: fixed-size per-heading lookup tables
//! - **engine**: construction, static geometry, range queries
//! - **crossing**: bow/stern crossing and port/starboard passing predicates
//!
//! # Example
//!
//! ```rust,ignore
//! use helmsman_core::cpa::CpaEngine;
//! use helmsman_core::geometry::Kinematics;
//!
//! let contact = Kinematics::new(0.0, 500.0, 180.0, 4.0);
//! let engine = CpaEngine::new(&contact, 0.0, 0.0);
//!
//! // Ownship turning to 090 at 5 m/s, 2 minute look-ahead
//! let cpa = engine.eval_cpa(90.0, 5.0, 120.0);
//! let crosses = engine.crosses_bow(90.0, 5.0);
//! ```
//!
//! An engine is built per control cycle and discarded afterwards; nothing
//! in it is shared between contacts or cycles.

mod crossing;
mod engine;
mod tables;

pub use engine::CpaEngine;
pub use tables::{DegreeTable, FineTable, HeadingTable, FINE_CACHE_SIZE, HEADING_CACHE_SIZE};
