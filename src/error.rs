//! Typed failures from the Karakeep API seam.
//!
//! [`ApiError`] separates the cases a caller reacts to differently:
//! a vanished list or bookmark ([`ApiError::NotFound`]), a redundant attach
//! ([`ApiError::AlreadyMember`]), and everything else that went wrong on the
//! wire ([`ApiError::Transport`], retryable by the caller). Errors are
//! `Clone` so one crawl outcome can be handed to every caller waiting on it.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The referenced list or bookmark no longer exists remotely.
    #[error("not found: {0}")]
    NotFound(String),

    /// The bookmark is already in the target list.
    #[error("bookmark {bookmark_id} is already in list {list_id}")]
    AlreadyMember {
        bookmark_id: String,
        list_id: String,
    },

    /// Network failure or an unexpected non-2xx status.
    #[error("request failed{}: {message}", fmt_status(.status))]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// A 2xx response whose body could not be understood.
    #[error("malformed response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

fn fmt_batch(failures: &[(String, ApiError)], succeeded: &[String]) -> String {
    let mut out = format!(
        "{} of {} lists",
        failures.len(),
        failures.len() + succeeded.len()
    );
    for (list_id, err) in failures {
        out.push_str(&format!("; {}: {}", list_id, err));
    }
    out
}

impl ApiError {
    pub fn transport(message: impl Into<String>) -> Self {
        ApiError::Transport {
            status: None,
            message: message.into(),
        }
    }

    /// Whether retrying the same request might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Transport { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    pub fn is_already_member(&self) -> bool {
        matches!(self, ApiError::AlreadyMember { .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

/// Failure of a batch attach: at least one target list was rejected.
///
/// Attaches listed in `succeeded` went through and are committed both
/// remotely and in the membership index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "failed to add bookmark {bookmark_id} to {}",
    fmt_batch(.failures, .succeeded)
)]
pub struct BatchAddError {
    pub bookmark_id: String,
    pub succeeded: Vec<String>,
    pub failures: Vec<(String, ApiError)>,
}

impl BatchAddError {
    /// True when every failure is a redundant attach.
    pub fn only_already_member(&self) -> bool {
        self.failures.iter().all(|(_, e)| e.is_already_member())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_display_includes_status() {
        let err = ApiError::Transport {
            status: Some(502),
            message: "bad gateway".into(),
        };
        assert_eq!(err.to_string(), "request failed (HTTP 502): bad gateway");
        assert_eq!(
            ApiError::transport("connection refused").to_string(),
            "request failed: connection refused"
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn test_batch_error_display() {
        let err = BatchAddError {
            bookmark_id: "b1".into(),
            succeeded: vec!["l1".into()],
            failures: vec![("l2".into(), ApiError::NotFound("list l2".into()))],
        };
        assert_eq!(
            err.to_string(),
            "failed to add bookmark b1 to 1 of 2 lists; l2: not found: list l2"
        );
        assert!(!err.only_already_member());
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn test_batch_error_lists_every_failure() {
        let err = BatchAddError {
            bookmark_id: "b1".into(),
            succeeded: vec![],
            failures: vec![
                (
                    "l1".into(),
                    ApiError::AlreadyMember {
                        bookmark_id: "b1".into(),
                        list_id: "l1".into(),
                    },
                ),
                ("l2".into(), ApiError::transport("timeout")),
            ],
        };
        assert_eq!(
            err.to_string(),
            "failed to add bookmark b1 to 2 of 2 lists; \
             l1: bookmark b1 is already in list l1; l2: request failed: timeout"
        );
        let boxed: Box<dyn std::error::Error> = Box::new(err);
        assert!(boxed.to_string().starts_with("failed to add bookmark b1"));
    }
}
