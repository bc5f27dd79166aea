//! The gate catalog and target encoding that together describe what a single circuit
//! instruction can mean.

mod catalog;
mod flags;
mod target;

pub use catalog::GateType;
pub use flags::GateFlags;
pub use target::GateTarget;
