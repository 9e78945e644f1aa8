//! # oracle-core
//!
//! Core types and traits for the oracle gateway node.
//!
//! This crate provides:
//! - [`Reading`] and [`ConsensusResult`], the data that flows through the
//!   aggregation pipeline
//! - [`OracleError`], the error taxonomy shared by every component
//! - [`ValidationError`] for field validation

pub mod error;
pub mod reading;
pub mod validation;

pub use error::OracleError;
pub use reading::{ConsensusResult, AggregationMethod, Reading, ReadingValue, SensorType, Unit};
pub use validation::{FieldValidator, ValidationError, ValidationResult};
