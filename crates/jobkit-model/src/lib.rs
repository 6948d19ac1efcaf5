mod error;
pub use error::ModelError;

mod domain;
pub use domain::*;

mod message;
pub use message::*;
