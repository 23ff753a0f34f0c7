//! Petition search composition and the ownership / lifecycle rules that gate
//! every mutation. Nothing in this crate performs I/O: the search module
//! produces parameterised SQL for the store to run, and the rules module
//! decides over facts the caller has already loaded.

pub mod error;
pub mod rules;
pub mod search;

pub use error::{Decision, Denial};
