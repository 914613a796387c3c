use thiserror::Error;

/// An adapter (or value listener) that failed while handling a notification.
#[derive(Error, Debug)]
#[error("adapter {adapter} failed: {source}")]
pub struct AdapterFailure {
    /// Type name of the failing adapter.
    pub adapter: &'static str,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("{attribute} expects a value of type {expected}, got {found}")]
    TypeMismatch {
        attribute: String,
        expected: String,
        found: String,
    },

    #[error("{attribute} is not an attribute of {class}")]
    NotAMember { attribute: String, class: String },

    #[error("{attribute} is a {arity} attribute")]
    WrongArity {
        attribute: String,
        arity: &'static str,
    },

    #[error("Can't move {object} to a new parent: an object can't be its own parent")]
    SelfContainment { object: String },

    #[error("Can't move {object} into {parent}: the new parent is a descendant of it")]
    ContainmentCycle { object: String, parent: String },

    #[error("Index {index} is out of bounds for {attribute} (len {len})")]
    IndexOutOfBounds {
        attribute: String,
        index: usize,
        len: usize,
    },

    #[error("{object} is not contained in {attribute}")]
    NotContained { object: String, attribute: String },

    #[error("Can't build path for {object}: neither it nor one of its ancestors has an id")]
    MissingId { object: String },

    #[error("Invalid id '{0}': ids must match [A-Za-z0-9_-]+")]
    InvalidId(String),

    #[error("Duplicate id in root objects: {0}")]
    DuplicateId(String),

    #[error("Malformed path '{path}': {reason}")]
    MalformedPath { path: String, reason: String },

    #[error("Cannot resolve object referenced by {object}.{attribute} with path {path}")]
    UnresolvedReference {
        object: String,
        attribute: String,
        path: String,
    },

    #[error("{object} ({class}) doesn't have the attribute {name}")]
    UnknownAttribute {
        object: String,
        class: String,
        name: String,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Sending {notification} failed for {} adapter(s)", .others.len() + 1)]
    Adapter {
        notification: String,
        #[source]
        first: AdapterFailure,
        others: Vec<AdapterFailure>,
    },

    #[error("Failed to serialize {location}")]
    Serialization {
        location: String,
        #[source]
        source: Box<ModelError>,
    },

    #[error("Codec error for {value_type}: {message}")]
    Codec { value_type: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    /// Builds the aggregate error for one dispatch, or `Ok` if nothing failed.
    pub(crate) fn from_failures(
        notification: impl FnOnce() -> String,
        failures: Vec<AdapterFailure>,
    ) -> Result<()> {
        let mut failures = failures.into_iter();
        match failures.next() {
            None => Ok(()),
            Some(first) => Err(ModelError::Adapter {
                notification: notification(),
                first,
                others: failures.collect(),
            }),
        }
    }

    /// All adapter failures carried by an [`ModelError::Adapter`], first one first.
    pub fn adapter_failures(&self) -> Vec<&AdapterFailure> {
        match self {
            ModelError::Adapter { first, others, .. } => {
                std::iter::once(first).chain(others.iter()).collect()
            }
            _ => Vec::new(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;

/// Keeps the first error of a multi-step mutation while the remaining steps
/// still run, so the object graph is never left half-updated.
#[derive(Default)]
pub(crate) struct FirstError(Option<ModelError>);

impl FirstError {
    pub(crate) fn record(&mut self, result: Result<()>) {
        if let Err(e) = result {
            if self.0.is_none() {
                self.0 = Some(e);
            }
        }
    }

    pub(crate) fn finish(self) -> Result<()> {
        match self.0 {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
