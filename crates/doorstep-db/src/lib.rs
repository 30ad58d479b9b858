pub mod conversation_store;

pub use conversation_store::{ConversationStore, Subscription};
