//! crates/tutoring_core/src/notify.rs
//!
//! Best-effort notifications. A failed send is logged and never fails the
//! operation that triggered it.

use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::UserAccount;
use crate::ports::Mailer;

pub(crate) async fn notify(mailer: &dyn Mailer, recipient: &UserAccount, template: &str, data: Value) {
    match mailer.send(&recipient.email, template, &data).await {
        Ok(()) => debug!(template, user_id = recipient.id, "Notification sent"),
        Err(e) => warn!(template, user_id = recipient.id, "Notification failed: {}", e),
    }
}
