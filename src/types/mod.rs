//! Core types for sluice.

pub mod event;
pub mod input;
pub mod response;

pub use event::*;
pub use input::*;
pub use response::*;
