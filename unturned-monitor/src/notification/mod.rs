//! Notification rendering and delivery.

mod dispatcher;
pub mod templates;
pub mod transport;

pub use dispatcher::{DeliveryFailure, DispatchReport, NotificationDispatcher};
pub use templates::MessageRenderer;
pub use transport::{MessagingTransport, OneBotConfig, OneBotTransport};
