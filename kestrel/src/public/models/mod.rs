//! Small reusable models built from the primitive cells.
//!
//! Each model registers its cell and exports its resources under whatever namespace the
//! given [Registrar](crate::Registrar) points at, so several instances can live side by side.

pub mod accumulator;
pub mod register;
pub mod sampled;

pub use accumulator::Accumulator;
pub use register::Register;
pub use sampled::Sampled;
