pub mod error;
pub mod geo;
pub mod message;
pub mod session;

pub use error::{Error, Result};
pub use geo::GeolocationResult;
pub use message::{ChatMessage, MessageSender};
pub use session::SessionKey;
