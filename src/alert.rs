use tracing::error;

use crate::store::StoreError;

pub const DEFAULT_FAILURE_MESSAGE: &str = "An unexpected error occurred";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Success,
    Error,
}

/// A blocking, user-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: AlertKind::Success,
            title: "Success".into(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: AlertKind::Error,
            title: "Error".into(),
            message: message.into(),
        }
    }

    /// Classifies `err`, traces it and turns it into the alert for `operation`.
    pub fn failure(operation: &str, err: &anyhow::Error) -> Self {
        error!(operation, error = %format!("{err:#}"), "operation failed");
        let failure = Failure::classify(err);
        Self::error(format!("Failed to {operation}: {}", failure.describe()))
    }
}

/// What a caught error turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// A structured store error with a machine-readable code.
    Store { code: String, message: String },
    Generic { message: String },
    Unknown,
}

impl Failure {
    pub fn classify(err: &anyhow::Error) -> Self {
        let remote = err
            .chain()
            .filter_map(|cause| cause.downcast_ref::<StoreError>())
            .find_map(|store| {
                Some(Self::Store {
                    code: store.code()?.to_string(),
                    message: store.to_string(),
                })
            });
        if let Some(store) = remote {
            return store;
        }

        let message = format!("{err:#}");
        if message.trim().is_empty() {
            Self::Unknown
        } else {
            Self::Generic { message }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Store { code, message } => format!("Store error ({code}): {message}"),
            Self::Generic { message } => message.clone(),
            Self::Unknown => DEFAULT_FAILURE_MESSAGE.to_string(),
        }
    }
}
