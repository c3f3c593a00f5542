//! Agent loop: repeated completion calls with tool rounds in between.

pub mod events;
pub mod runner;
pub mod types;

pub use events::*;
pub use runner::*;
pub use types::*;
