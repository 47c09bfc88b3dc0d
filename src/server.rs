//! Language server transport over stdio.

pub mod backend;
mod handlers;

pub use backend::Backend;
pub use handlers::execute_command::COMMANDS;
