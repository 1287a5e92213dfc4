//! Error types for the workspace model.

use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::core::build_matrix::ConfigField;
use crate::core::configuration::ParseEnumError;
use crate::document::DocumentError;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Invalid workspace or project setup.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum ConfigurationError {
    #[error("{subject} has no location")]
    #[diagnostic(
        code(geno::config::location_missing),
        help("Give the {subject} a directory before saving or loading it")
    )]
    LocationMissing { subject: String },

    #[error("a project named `{name}` already exists in this workspace")]
    #[diagnostic(code(geno::config::duplicate_project))]
    DuplicateProject { name: String },
}

/// Failure to save or load a workspace or project document.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("{}: {source}", path.display())]
    InvalidValue {
        path: PathBuf,
        #[source]
        source: ParseEnumError,
    },

    #[error("{}: {source}", path.display())]
    Matrix {
        path: PathBuf,
        #[source]
        source: MatrixError,
    },
}

impl PersistenceError {
    /// Convert to a user-facing diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        match self {
            PersistenceError::Configuration(ConfigurationError::LocationMissing { .. }) => {
                diag.with_suggestion(suggestions::SET_LOCATION)
            }
            PersistenceError::Document(DocumentError::Open { path, .. }) => diag
                .with_location(path.clone())
                .with_suggestion(suggestions::CHECK_PERMISSIONS),
            PersistenceError::Document(DocumentError::Parse { .. }) => {
                diag.with_suggestion(suggestions::FIX_DOCUMENT)
            }
            PersistenceError::InvalidValue { path, .. } | PersistenceError::Matrix { path, .. } => {
                diag.with_location(path.clone())
                    .with_suggestion(suggestions::FIX_DOCUMENT)
            }
            _ => diag,
        }
    }
}

/// Failure of a workspace-level operation.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Matrix(#[from] MatrixError),

    #[error("no project named `{name}` in this workspace")]
    ProjectNotFound { name: String },
}

impl WorkspaceError {
    /// Convert to a user-facing diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            WorkspaceError::Persistence(e) => e.to_diagnostic(),
            WorkspaceError::Configuration(e @ ConfigurationError::LocationMissing { .. }) => {
                Diagnostic::error(e.to_string()).with_suggestion(suggestions::SET_LOCATION)
            }
            WorkspaceError::ProjectNotFound { .. } => Diagnostic::error(self.to_string())
                .with_suggestion(suggestions::PROJECT_NOT_FOUND),
            WorkspaceError::Matrix(e) => {
                let diag = Diagnostic::error(e.to_string());
                match e {
                    MatrixError::UnknownOption { column, .. }
                    | MatrixError::MissingSelection { column } => diag.with_suggestion(format!(
                        "Run `geno matrix` to list the options of column `{}`",
                        column
                    )),
                    _ => diag,
                }
            }
            _ => Diagnostic::error(self.to_string()),
        }
    }
}

/// Build matrix construction or resolution error.
#[derive(Debug, Clone, PartialEq, Eq, Error, MietteDiagnostic)]
pub enum MatrixError {
    #[error("columns `{first}` and `{second}` both set {field}")]
    #[diagnostic(
        code(geno::matrix::conflicting_column),
        help("Move every {field} setting into a single column")
    )]
    ConflictingColumn {
        first: String,
        second: String,
        field: ConfigField,
    },

    #[error("no option selected for column `{column}`")]
    #[diagnostic(code(geno::matrix::missing_selection))]
    MissingSelection { column: String },

    #[error("column `{column}` has no option `{option}`")]
    #[diagnostic(code(geno::matrix::unknown_option))]
    UnknownOption { column: String, option: String },

    #[error("no column named `{column}`")]
    #[diagnostic(code(geno::matrix::unknown_column))]
    UnknownColumn { column: String },

    #[error("column `{column}` already exists")]
    #[diagnostic(code(geno::matrix::duplicate_column))]
    DuplicateColumn { column: String },

    #[error("column `{column}` already has option `{option}`")]
    #[diagnostic(code(geno::matrix::duplicate_option))]
    DuplicateOption { column: String, option: String },

    #[error("option `{option}` of column `{column}`: {message}")]
    #[diagnostic(code(geno::matrix::invalid_setting))]
    InvalidSetting {
        column: String,
        option: String,
        message: String,
    },
}
