//! Remote model access and the context fed to it

pub mod context;
pub mod invoker;
pub mod metadata;
pub mod openai;
pub mod prompt;
