//! Desktop notifications for host lifecycle events.
//!
//! Maps a lifecycle event kind to a title and message and hands it to a
//! [`Notifier`]. The default notifier runs `notify-send` with structured
//! arguments (never through a shell).

use std::future::Future;

use tokio::process::Command;

use crate::error::CheckupError;

/// Lifecycle events that produce a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    SessionComplete,
    PermissionRequest,
    SessionError,
}

impl LifecycleEvent {
    /// Parse a host event kind. Unrecognised kinds return `None`.
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "session.complete" => Some(LifecycleEvent::SessionComplete),
            "permission.request" => Some(LifecycleEvent::PermissionRequest),
            "session.error" => Some(LifecycleEvent::SessionError),
            _ => None,
        }
    }

    pub fn notification(self) -> Notification {
        let (title, message) = match self {
            LifecycleEvent::SessionComplete => (
                "✅ Task Completed",
                "OpenCode has finished the task. Ready for review.",
            ),
            LifecycleEvent::PermissionRequest => (
                "🔒 Permission Required",
                "OpenCode is waiting for your permission to proceed.",
            ),
            LifecycleEvent::SessionError => (
                "❌ Error Occurred",
                "An error happened in your OpenCode session. Please check the terminal.",
            ),
        };
        Notification { title, message }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    pub title: &'static str,
    pub message: &'static str,
}

/// Delivers a notification to the desktop.
pub trait Notifier {
    fn send(&self, notification: &Notification) -> impl Future<Output = crate::Result<()>> + Send;
}

/// Runs `notify-send <title> <message>`.
#[derive(Debug, Clone)]
pub struct NotifySend {
    program: String,
}

impl Default for NotifySend {
    fn default() -> Self {
        Self {
            program: "notify-send".to_string(),
        }
    }
}

impl NotifySend {
    /// Use a different executable with the same `<title> <message>` calling convention.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Notifier for NotifySend {
    async fn send(&self, notification: &Notification) -> crate::Result<()> {
        let output = Command::new(&self.program)
            .arg(notification.title)
            .arg(notification.message)
            .output()
            .await
            .map_err(|e| CheckupError::Notification(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CheckupError::Notification(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Send the notification for `kind`, if it has one.
///
/// Returns `Ok(false)` for event kinds without a notification.
pub async fn dispatch<N: Notifier>(kind: &str, notifier: &N) -> crate::Result<bool> {
    let Some(event) = LifecycleEvent::parse(kind) else {
        tracing::debug!(event = %kind, "no notification for event");
        return Ok(false);
    };
    let notification = event.notification();
    notifier.send(&notification).await?;
    tracing::info!(event = %kind, title = notification.title, "notification sent");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
    }

    impl Notifier for RecordingNotifier {
        async fn send(&self, notification: &Notification) -> crate::Result<()> {
            self.sent.lock().unwrap().push(*notification);
            Ok(())
        }
    }

    #[test]
    fn test_parse_known_events() {
        assert_eq!(
            LifecycleEvent::parse("session.complete"),
            Some(LifecycleEvent::SessionComplete)
        );
        assert_eq!(
            LifecycleEvent::parse("permission.request"),
            Some(LifecycleEvent::PermissionRequest)
        );
        assert_eq!(
            LifecycleEvent::parse("session.error"),
            Some(LifecycleEvent::SessionError)
        );
        assert_eq!(LifecycleEvent::parse("session.idle"), None);
    }

    #[test]
    fn test_notification_text() {
        let n = LifecycleEvent::PermissionRequest.notification();
        assert_eq!(n.title, "🔒 Permission Required");
        assert_eq!(
            n.message,
            "OpenCode is waiting for your permission to proceed."
        );
    }

    #[tokio::test]
    async fn test_dispatch_sends_for_known_event() {
        let notifier = RecordingNotifier::default();
        assert!(dispatch("session.error", &notifier).await.unwrap());
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.as_slice(), &[LifecycleEvent::SessionError.notification()]);
    }

    #[tokio::test]
    async fn test_dispatch_ignores_unknown_event() {
        let notifier = RecordingNotifier::default();
        assert!(!dispatch("review.request", &notifier).await.unwrap());
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_notify_send_missing_program() {
        let notifier = NotifySend::with_program("/this/command/does/not/exist-mcp-checkup");
        let result = notifier
            .send(&LifecycleEvent::SessionComplete.notification())
            .await;
        assert!(matches!(result, Err(CheckupError::Notification(_))));
    }

    #[cfg(all(unix, feature = "integration-tests"))]
    #[tokio::test]
    async fn test_notify_send_nonzero_exit() {
        let notifier = NotifySend::with_program("false");
        let result = notifier
            .send(&LifecycleEvent::SessionComplete.notification())
            .await;
        assert!(
            matches!(result, Err(CheckupError::Notification(msg)) if msg.contains("exited with"))
        );
    }

    #[cfg(all(unix, feature = "integration-tests"))]
    #[tokio::test]
    async fn test_notify_send_success_with_true() {
        let notifier = NotifySend::with_program("true");
        assert!(notifier
            .send(&LifecycleEvent::SessionComplete.notification())
            .await
            .is_ok());
    }
}
