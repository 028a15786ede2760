//! ilforge coercion planner: given a loaded value's source type and a
//! desired destination type, either plan the instruction sequence that
//! adapts the value or report that none exists.
//!
//! Planning is the speculative channel: [`plan`] returns a value either
//! way, so callers can probe feasibility without committing side effects.
//! [`coerce`] is the fail-fast wrapper that plans and emits in one call.
//!
//! # Dependencies
//!
//! This crate uses `ilforge-common` for type descriptors,
//! `ilforge-assembler` to apply plans, and `thiserror` for error types.

pub mod error;
pub mod plan;

pub use error::CoerceError;
pub use plan::{coerce, emit_plan, plan, CoercionPlan, CoercionStep};
