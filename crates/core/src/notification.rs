#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationVariant {
    #[default]
    Default,
    Destructive,
}

/// A transient, user-visible notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: Option<String>,
    pub variant: NotificationVariant,
}

impl Notification {
    pub fn info(title: &str, description: Option<String>) -> Self {
        Self {
            title: title.to_string(),
            description,
            variant: NotificationVariant::Default,
        }
    }

    pub fn destructive(title: &str, description: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            description: Some(description.into()),
            variant: NotificationVariant::Destructive,
        }
    }
}

pub trait Notifier: Send {
    fn notify(&self, notification: Notification);
}

impl Notifier for tokio::sync::mpsc::UnboundedSender<Notification> {
    fn notify(&self, notification: Notification) {
        if let Err(e) = self.send(notification) {
            tracing::warn!("notification dropped, no one is listening: {:?}", e.0);
        }
    }
}
