//! Terminal presentation layer

mod cli;
mod terminal;

pub use cli::{map_key, render_status, status_key, Args, Cli, KeyAction, LogFormat};
pub use terminal::{run_session, TerminalGuard};
