//! Shared domain building blocks for the roster workspace.
//!
//! Everything here is free of I/O: identifier and timestamp types, the
//! domain error enum, Argon2id password hashing and paging arithmetic.

pub mod error;
pub mod paging;
pub mod password;
pub mod types;
