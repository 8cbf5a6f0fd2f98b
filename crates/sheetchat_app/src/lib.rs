pub mod commands;
pub mod dispatcher;
pub mod render;
pub mod session;

pub use commands::{Command, CommandError, Input, parse_input};
pub use dispatcher::{AppState, Effect, dispatch};
pub use session::{ChatSession, SendOutcome};
