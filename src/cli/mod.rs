//! Command-line interface.

pub mod args;
pub mod interrupt;

pub use args::Args;
pub use interrupt::{ctrl_c_presses, watch_interrupts};
