//! Cortex Core — domain models, repository traits, and the error
//! taxonomy shared by every other crate in the workspace.

pub mod error;
pub mod models;
pub mod repository;

pub use error::{CoreError, CoreResult};
