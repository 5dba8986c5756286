//! OS notification backend.

use dashtimer_core::{Notification, NotificationDispatcher, NotifyError};

/// Shows engine notifications through the desktop notification service.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopDispatcher;

impl NotificationDispatcher for DesktopDispatcher {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut toast = notify_rust::Notification::new();
        toast
            .summary(&notification.title)
            .body(&notification.message)
            .appname("dashtimer")
            .icon("alarm-clock");
        if notification.sound {
            toast.sound_name("complete");
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            toast.urgency(urgency(notification.kind));
        }

        toast
            .show()
            .map(|_| ())
            .map_err(|e| NotifyError::Backend(e.to_string()))
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn urgency(kind: dashtimer_core::NotificationKind) -> notify_rust::Urgency {
    match kind {
        dashtimer_core::NotificationKind::PreAlert => notify_rust::Urgency::Normal,
        dashtimer_core::NotificationKind::Completion => notify_rust::Urgency::Critical,
    }
}
