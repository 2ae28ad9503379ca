//! Stratus Core
//!
//! Configuration model and semantic validation for a cluster provisioning tool.
//! The schema layer parses a YAML/JSON document into typed model structs; the
//! validation layer runs semantic rules over the parsed fields and collects
//! failures into a report.

pub mod config;
pub mod lookup;
pub mod validation;
