use std::cell::RefCell;

use super::Notifier;

/// 通过日志输出通知
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show_notification(&self, title: &str, message: &str) {
        tracing::warn!(target: "wordmark::notification", "{}: {}", title, message);
    }
}

/// 记录全部通知，便于检查
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: RefCell<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<(String, String)> {
        self.notifications.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.notifications.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.borrow().is_empty()
    }
}

impl Notifier for RecordingNotifier {
    fn show_notification(&self, title: &str, message: &str) {
        self.notifications
            .borrow_mut()
            .push((title.to_string(), message.to_string()));
    }
}
