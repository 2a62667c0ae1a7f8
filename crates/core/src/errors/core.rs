use crate::config::ConfigError;
use crate::container::events::LifecycleStage;
use thiserror::Error;

/// Boxed error returned by user-supplied constructors, hooks and processors
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias used throughout the container core
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type for the sprout container
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Definition {kind} '{key}' is already registered")]
    AlreadyExists { key: String, kind: &'static str },

    #[error("No definition found for '{name}'")]
    NotFound { name: String },

    #[error("Construction of '{id}' failed: {source}")]
    ConstructionFailed { id: String, source: BoxError },

    #[error("Definition '{id}' returns a prebound instance and cannot be constructed with {arg_count} explicit argument(s)")]
    UnsupportedConstruction { id: String, arg_count: usize },

    #[error("Lifecycle phase '{stage}' failed for '{id}': {source}")]
    LifecycleFailed {
        id: String,
        stage: LifecycleStage,
        source: BoxError,
    },

    #[error("Binding property '{member}' of '{id}' failed: {message}")]
    PropertyBinding {
        id: String,
        member: String,
        message: String,
    },

    #[error("Static dependence pass failed for type '{type_name}': {source}")]
    StaticDependenceFailed { type_name: String, source: BoxError },

    #[error("Circular dependency detected: {path} (cycle at: {id})")]
    CircularDependency { path: String, id: String },

    #[error("Instance of '{id}' is not a '{expected}'")]
    TypeMismatch { id: String, expected: &'static str },

    #[error("Method '{method}' is not available on '{id}'")]
    MethodNotFound { id: String, method: String },

    #[error("Invocation of '{method}' on '{id}' failed: {message}")]
    InvocationFailed {
        id: String,
        method: String,
        message: String,
    },

    #[error("Instance of '{id}' has already been destroyed")]
    InstanceDestroyed { id: String },

    #[error("Lock error on resource: {resource}")]
    LockError { resource: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl CoreError {
    /// Create a new not found error
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Wrap an underlying construction failure, tagged with the definition id
    pub fn construction_failed(id: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::ConstructionFailed {
            id: id.into(),
            source: source.into(),
        }
    }

    /// Wrap a failing lifecycle hook
    pub fn lifecycle_failed(
        id: impl Into<String>,
        stage: LifecycleStage,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::LifecycleFailed {
            id: id.into(),
            stage,
            source: source.into(),
        }
    }

    /// Create an invocation error from a message
    pub fn invocation_failed(
        id: impl Into<String>,
        method: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvocationFailed {
            id: id.into(),
            method: method.into(),
            message: message.into(),
        }
    }

    /// Create a lock error for the named resource
    pub fn lock(resource: impl Into<String>) -> Self {
        Self::LockError {
            resource: resource.into(),
        }
    }

    /// Check if the error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if the error is a registration conflict
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Check if the error came out of a construction strategy
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Self::ConstructionFailed { .. } | Self::UnsupportedConstruction { .. }
        )
    }
}
