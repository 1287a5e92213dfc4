//! The workspace model.
//!
//! - [`Configuration`]: compile and link settings
//! - [`Project`]: one output with its source files
//! - [`BuildMatrix`]: named columns of configuration variants
//! - [`Workspace`]: projects built in queue order

pub mod build_matrix;
pub mod configuration;
pub mod errors;
pub mod project;
pub mod workspace;

pub use build_matrix::{BuildMatrix, ConfigPatch, Selection};
pub use configuration::{Architecture, Configuration, OutputKind};
pub use errors::{ConfigurationError, MatrixError, PersistenceError, WorkspaceError};
pub use project::Project;
pub use workspace::{BuildState, Workspace, WorkspaceBuild};
