//! Assembly operations - orchestration over core + io

pub mod assemble;
pub mod error;
pub mod extract;
pub mod origin;
pub mod patch;

pub use error::AssembleError;
