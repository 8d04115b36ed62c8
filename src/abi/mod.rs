//! Encoding registry.
//!
//! Hooks are heterogeneous, so their argument shapes are only known at call time.
//! This module interprets a runtime [`EncodingSpec`] instead of relying on
//! compile-time bindings:
//!
//! - `tag`: type tags, spec parsing and canonical formatting
//! - `registry`: shape checks, encode and decode against a spec
//! - `coerce`: JSON caller values into tagged values
//! - `function`: selector + parameters for a runtime-described function

pub mod coerce;
pub mod function;
pub mod registry;
pub mod tag;

pub use alloy::dyn_abi::DynSolValue;
pub use function::FunctionCall;
pub use registry::{decode, encode, encode_json};
pub use tag::{EncodingSpec, SPEC_DELIMITER, TypeTag};
