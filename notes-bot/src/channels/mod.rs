//! Chat channel layer: intent translation, the conversation controller and
//! the transports it talks through.

pub mod dispatcher;
pub mod format;
pub mod intent;
pub mod telegram;
pub mod texts;
pub mod transport;
pub mod types;
pub mod util;


pub use dispatcher::ConversationController;
