// src/sessions/mod.rs

//! Background sessions: commands that outlive the call that started them.
//!
//! A session moves `running -> exited` exactly once. Output is buffered per
//! stream with arrival timestamps; each poll ([`SessionManager::get_session`])
//! returns only what arrived since the previous poll. The first poll after
//! exit also unregisters the session.

mod manager;
mod session;

pub use manager::{BackgroundHandle, SessionManager};
pub use session::{SessionSnapshot, SessionSummary, TimedChunk};
