//! Output formatting for the `notevec` binary.

pub mod output;
