//! Input readers and side channels for Nami.
//!
//! Available pieces:
//! - **Lines**: stdin and external producer processes merged into one stream
//! - **Console**: terminal UI sink and a chat relay that prints instead of posting
//! - **Speaker**: text-to-speech through a configured command

pub mod console;
pub mod lines;
pub mod speaker;

pub use console::{ConsoleChat, ConsoleUi};
pub use lines::{CONSOLE_ORIGIN, LineSources, SourceLine, pump_lines};
pub use speaker::CommandSpeaker;
