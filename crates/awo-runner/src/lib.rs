pub mod config;
pub mod context;
pub mod engine;
pub mod environment;
pub mod failure;
pub mod ops;
pub mod report;
pub mod util;
pub mod workflow;

pub use config::*;
pub use context::*;
pub use engine::*;
pub use environment::*;
pub use failure::*;
pub use report::*;
pub use util::*;
pub use workflow::*;
