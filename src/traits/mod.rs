//! Core traits for service teardown.

pub mod dispose;

pub use dispose::AsyncDispose;
