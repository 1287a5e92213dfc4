//! Geno - build orchestration for C and C++ workspaces
//!
//! A workspace holds projects, each compiled and linked with the MSVC or
//! GCC/Clang toolchain, and persisted as indented text documents.

pub mod builder;
pub mod core;
pub mod document;
pub mod util;

/// Mock toolchain environment and process runner for unit tests.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{Configuration, Project, Workspace};
pub use builder::{BuildEvent, Compiler};
