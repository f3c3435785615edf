pub mod client;
pub mod orchestrator;
pub mod prompts;
pub mod session;
pub mod types;

pub use client::*;
pub use orchestrator::*;
pub use session::*;
pub use types::*;
