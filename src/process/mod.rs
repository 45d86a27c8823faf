//! Launching and supervising the wrapped executable

mod command;
mod supervisor;

pub use command::tokenize_args;
pub use supervisor::ProcessSupervisor;
