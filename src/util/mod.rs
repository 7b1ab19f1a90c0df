//! Helpers shared by the dump, upload and retention steps.

pub mod naming;
pub mod retention;
