use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum IndexError {
    #[error("Parent resource not found for {resource_type}: no {parent_resource_type} entry for {}", .parent_reference.as_deref().unwrap_or("<none>"))]
    #[diagnostic(
        code(resource_index::parent_not_found),
        help("Index the parent first, or run `recreate` for parent types before dependent types")
    )]
    ParentNotFound {
        resource_type: String,
        parent_resource_type: String,
        parent_reference: Option<String>,
    },

    #[error("Configuration error: {0}")]
    #[diagnostic(code(resource_index::configuration))]
    Configuration(String),

    #[error("Storage error: {0}")]
    #[diagnostic(code(resource_index::storage))]
    Storage(#[from] sea_orm::DbErr),

    #[error("Settings error: {0}")]
    #[diagnostic(code(resource_index::settings))]
    Settings(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    #[diagnostic(code(resource_index::io))]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    #[diagnostic(code(resource_index::other))]
    Other(String),
}

impl IndexError {
    pub fn is_parent_not_found(&self) -> bool {
        matches!(self, IndexError::ParentNotFound { .. })
    }
}
