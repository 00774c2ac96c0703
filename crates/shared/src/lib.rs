//! Wire-level types shared by the client core, the fixture server and the CLI.

pub mod domain;
pub mod error;
pub mod html;
pub mod protocol;
