//! OAuth broker core: sealed state tokens and the authorize/complete
//! state machine.

pub mod broker;
pub mod state;

pub use broker::{AuthorizeError, Broker, CompleteError};
pub use state::{StateToken, StateTokenError};
