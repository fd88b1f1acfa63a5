//! Hardware collaborator interfaces and mock implementations.
//!
//! The engine never talks to wire protocols directly; it consumes the
//! capability traits in [`capabilities`] and is handed concrete devices at
//! construction time. [`mock`] provides simulated devices for headless
//! operation and tests.

pub mod capabilities;
pub mod mock;

pub use capabilities::{Movable, SampleSource};
