//! User feedback sink ("toasts").
//!
//! Components report their own failures here instead of propagating them to a
//! global handler. Injected explicitly so tests can inspect what a user saw.

use std::sync::Mutex;

use tracing::{error, info};

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

pub trait Toaster: Send + Sync {
    fn show(&self, toast: Toast);

    fn success(&self, message: &str) {
        self.show(Toast {
            level: ToastLevel::Success,
            message: message.to_string(),
        });
    }

    fn info(&self, message: &str) {
        self.show(Toast {
            level: ToastLevel::Info,
            message: message.to_string(),
        });
    }

    fn failure(&self, err: &ClientError) {
        self.show(Toast {
            level: ToastLevel::Error,
            message: err.user_message(),
        });
    }
}

/// Emits toasts as log events.
#[derive(Debug, Default)]
pub struct LogToaster;

impl Toaster for LogToaster {
    fn show(&self, toast: Toast) {
        match toast.level {
            ToastLevel::Error => error!(toast = %toast.message, "user-visible error"),
            ToastLevel::Info | ToastLevel::Success => info!(toast = %toast.message, "user notice"),
        }
    }
}

/// Keeps every toast in memory.
#[derive(Debug, Default)]
pub struct RecordingToaster {
    toasts: Mutex<Vec<Toast>>,
}

impl RecordingToaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.toasts()
            .into_iter()
            .filter(|toast| toast.level == ToastLevel::Error)
            .map(|toast| toast.message)
            .collect()
    }
}

impl Toaster for RecordingToaster {
    fn show(&self, toast: Toast) {
        self.toasts
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(toast);
    }
}
