//! Terminal launcher and presentation layer for ideagen runs.

pub mod cli;
pub mod presenter;
pub mod render;
