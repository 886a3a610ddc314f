//! The release hooks: verifyConditions, prepare and publish

mod cancel;
mod list;
mod prepare;
mod publish;
mod verify;

pub use cancel::*;
pub use list::*;
pub use prepare::*;
pub use publish::*;
pub use verify::*;
