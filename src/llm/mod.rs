pub mod client;
pub mod extract;
pub mod openai;
pub mod preflight;
pub mod prompts;
pub mod provider;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

pub use client::*;
pub use extract::*;
pub use openai::*;
pub use preflight::*;
pub use prompts::*;
pub use provider::*;
pub use retry::*;
