//! Line-oriented terminal interface for interactive chat sessions.
//!
//! - [`chat_loop`]: login prompt and the read/dispatch/render loop that hands
//!   input to [`crate::commands`] and turns to [`crate::core::chat`].
//! - [`renderer`]: how messages, notices and errors are printed.

pub mod chat_loop;
pub mod renderer;
