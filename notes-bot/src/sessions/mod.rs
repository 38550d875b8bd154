//! Per-user conversation sessions. They live only in
//! process memory and are rebuilt from `/start` after a restart.

pub mod cache;
pub mod session;

pub use cache::SessionCache;
pub use session::{ConversationState, SearchSession};
