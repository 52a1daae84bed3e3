//! Client-side form state.
pub mod upload;
