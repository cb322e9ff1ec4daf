pub mod client;
pub mod common;
pub mod directives;
pub mod module;
pub mod queue;
pub mod runtime;
pub mod script;

pub type Error = crate::common::error::SbatchError;
pub type Result<T> = std::result::Result<T, Error>;
