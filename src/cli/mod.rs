//! CLI command handling

pub mod output;
pub mod run;
pub mod setup;

pub use output::*;
pub use run::*;
pub use setup::*;
