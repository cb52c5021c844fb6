//! Library side of the `todos` binary

pub mod cli;
pub mod commands;
