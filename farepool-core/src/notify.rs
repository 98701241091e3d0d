use async_trait::async_trait;
use farepool_shared::Notification;

/// Outbound delivery seam (push, SMS, email). State-changing operations call
/// this after they commit; a delivery failure must never roll them back, so
/// callers log the error and move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(
        &self,
        notification: &Notification,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Default sink that writes notifications to the log stream. Free-text
/// payload fields are `Masked`, so the Debug output here stays safe.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(
        &self,
        notification: &Notification,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!(
            recipient = %notification.recipient,
            kind = notification.event.kind(),
            event = ?notification.event,
            "notification dispatched"
        );
        Ok(())
    }
}
