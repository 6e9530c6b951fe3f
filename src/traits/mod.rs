pub mod arrow;
pub mod stage;

pub use arrow::{ArrowProcessor, ArrowReceiver, ArrowSender, EventId};
pub use stage::{Element, Pull, Stage, Upstream};
