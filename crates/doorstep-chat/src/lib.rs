pub mod controller;
pub mod resolver;

pub use controller::{ACK_TEXT, ChatSessionController, SessionState};
pub use resolver::derive_key;
