//! Subcommand implementations.

pub mod check;
pub mod login;
pub mod logout;
pub mod refresh;
pub mod request;
pub mod watch;
pub mod whoami;
