//! Session and generation flow for DocChat.
//!
//! A turn goes:
//!
//! 1. **Upload** documents into the session's file registry (remote store)
//! 2. **Select** the subset that should accompany the next prompts
//! 3. **Ask**: the orchestrator sends the prompt plus the selected file
//!    handles to the model and records both sides in the conversation log
//!
//! Front-ends (the HTTP gateway, the terminal REPL) only ever talk to a
//! [`Session`].

pub mod orchestrator;
pub mod session;

pub use orchestrator::{
    DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE, Orchestrator,
};
pub use session::{Connectivity, Session, SessionFactory, SessionId, SessionStats, Transcript};
