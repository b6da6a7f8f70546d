//! Fan-out of one message to many recipients.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::templates::MessageRenderer;
use super::transport::MessagingTransport;
use crate::domain::{Recipient, RecipientKey, TransitionEvent};

/// One failed delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryFailure {
    pub recipient: RecipientKey,
    pub error: String,
}

/// Aggregate outcome of a dispatch, in recipient order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub succeeded: Vec<RecipientKey>,
    pub failed: Vec<DeliveryFailure>,
}

impl DispatchReport {
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempted() == 0
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Renders transitions and delivers them through a transport.
///
/// Deliveries run concurrently and each one is isolated: an error or a
/// panic in one send is recorded in the report and never reaches the caller.
pub struct NotificationDispatcher {
    transport: Arc<dyn MessagingTransport>,
    renderer: MessageRenderer,
}

impl NotificationDispatcher {
    pub fn new(transport: Arc<dyn MessagingTransport>, renderer: MessageRenderer) -> Self {
        Self {
            transport,
            renderer,
        }
    }

    pub fn renderer(&self) -> &MessageRenderer {
        &self.renderer
    }

    /// Render `event` and deliver it to `recipients`.
    /// A `None` transition sends nothing and yields an empty report.
    pub async fn dispatch(
        &self,
        event: &TransitionEvent,
        recipients: &[Recipient],
    ) -> DispatchReport {
        let Some(text) = self.renderer.render(event) else {
            return DispatchReport::default();
        };

        let report = self.deliver(&text, recipients).await;
        info!(
            kind = %event.kind,
            delivered = report.succeeded.len(),
            failed = report.failed.len(),
            "Transition notification dispatched"
        );
        report
    }

    /// Deliver free-form text, used for broadcasts and service notices.
    pub async fn send_text(&self, text: &str, recipients: &[Recipient]) -> DispatchReport {
        let report = self.deliver(text, recipients).await;
        debug!(
            delivered = report.succeeded.len(),
            failed = report.failed.len(),
            "Text message dispatched"
        );
        report
    }

    async fn deliver(&self, text: &str, recipients: &[Recipient]) -> DispatchReport {
        let sends = recipients.iter().map(|recipient| {
            let key = recipient.key();
            async move {
                let outcome = AssertUnwindSafe(self.transport.send(&key, text))
                    .catch_unwind()
                    .await;
                let result = match outcome {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err("transport panicked".to_string()),
                };
                (key, result)
            }
        });

        // join_all keeps input order, so the report follows recipient order.
        let mut report = DispatchReport::default();
        for (key, result) in join_all(sends).await {
            match result {
                Ok(()) => report.succeeded.push(key),
                Err(error) => {
                    warn!(
                        recipient = %key,
                        transport = self.transport.transport_type(),
                        error = %error,
                        "Notification delivery failed"
                    );
                    report.failed.push(DeliveryFailure {
                        recipient: key,
                        error,
                    });
                }
            }
        }
        report
    }
}
