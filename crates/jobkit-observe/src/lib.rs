mod logger;
pub use logger::*;

pub mod lifecycle;
pub use lifecycle::{Lifecycle, LifecycleKind, log_event};
