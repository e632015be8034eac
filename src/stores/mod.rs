//! Per-request state containers behind the CRUD endpoints.
//!
//! A store wraps one data service and records what the UI needs besides the
//! data itself: a loading flag, the last error and the notices (toasts) to
//! show. Failures never escape a store as errors on list operations; they
//! become an error notice and an empty or unchanged list.

pub mod archives;
pub mod email_templates;
pub mod engineers;
pub mod projects;

pub use archives::ArchiveStore;
pub use email_templates::TemplateStore;
pub use engineers::EngineerStore;
pub use projects::ProjectStore;

use serde::Serialize;
use tracing::error;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// A user-visible notice.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Notice {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: title.into(),
            description: Some(description.into()),
        }
    }

    pub fn info(title: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.into(),
            description: None,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            description: Some(description.into()),
        }
    }
}

/// Items plus loading/error/notice bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct StoreState<T> {
    pub items: Vec<T>,
    pub loading: bool,
    pub error: Option<String>,
    pub notices: Vec<Notice>,
}

impl<T> Default for StoreState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
            notices: Vec::new(),
        }
    }
}

impl<T> StoreState<T> {
    pub fn begin(&mut self) {
        self.loading = true;
        self.error = None;
    }

    pub fn finish(&mut self) {
        self.loading = false;
    }

    pub fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    /// Record a failure: log it, keep its message and raise an error notice.
    /// Auth failures get the re-login prompt instead of the raw message.
    pub fn fail(&mut self, title: &str, err: &ApiError) {
        error!(error = %err, title, "Store operation failed");
        let message = err.notice_message();
        self.error = Some(message.clone());
        self.loading = false;
        self.notices.push(Notice::error(title, message));
    }

    /// Notices accumulated so far, for the response envelope.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SESSION_EXPIRED_MESSAGE;

    #[test]
    fn auth_failures_prompt_for_login() {
        let mut state: StoreState<()> = StoreState::default();
        state.begin();
        state.fail("読み込みエラー", &ApiError::Upstream {
            status: 500,
            message: "JWT expired".into(),
        });

        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some(SESSION_EXPIRED_MESSAGE));
        assert_eq!(state.notices[0].level, NoticeLevel::Error);
        assert_eq!(state.notices[0].description.as_deref(), Some(SESSION_EXPIRED_MESSAGE));
    }

    #[test]
    fn plain_failures_keep_their_message() {
        let mut state: StoreState<()> = StoreState::default();
        state.fail("エラー", &ApiError::bad_request("技術者名は必須です"));
        assert_eq!(state.take_notices().len(), 1);
        assert!(state.notices.is_empty());
        assert!(state.error.is_some());
    }
}
