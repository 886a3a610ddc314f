//! CLI commands

mod completions;
mod list;
mod prepare;
mod publish;
mod verify;

pub use completions::CompletionsCommand;
pub use list::ListCommand;
pub use prepare::PrepareCommand;
pub use publish::PublishCommand;
pub use verify::VerifyCommand;
