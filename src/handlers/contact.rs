use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{HandlerContext, HandlerError, TaskHandler};
use crate::notify::{Notification, Notifier};
use crate::task::TaskType;

/// An outreach draft. Nothing is actually sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRequest {
    pub creator_id: String,
    pub creator_name: String,
    pub status: String,
    pub message: String,
}

/// Prepares one contact request per upstream creator and surfaces the
/// premium upsell through the notifier.
pub struct ContactHandler {
    notifier: Arc<dyn Notifier>,
}

impl ContactHandler {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl TaskHandler for ContactHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Contact
    }

    fn delay(&self) -> Duration {
        Duration::from_millis(1500)
    }

    async fn handle(&self, ctx: &HandlerContext<'_>) -> Result<Value, HandlerError> {
        let creators = ctx
            .creators()
            .filter(|c| !c.is_empty())
            .ok_or(HandlerError::NoCreatorsToContact)?;

        let requests: Vec<ContactRequest> = creators
            .into_iter()
            .map(|c| ContactRequest {
                message: format!(
                    "Hi {}, we'd love to collaborate with you on an upcoming campaign.",
                    c.full_name
                ),
                creator_id: c.id,
                creator_name: c.full_name,
                status: "prepared".to_string(),
            })
            .collect();

        self.notifier.notify(Notification::upsell(
            "Upgrade to send messages",
            format!(
                "{} contact requests prepared. Upgrade to Premium to send them directly.",
                requests.len()
            ),
        ));

        tracing::debug!(count = requests.len(), "Contact requests prepared");
        Ok(serde_json::to_value(requests).unwrap_or_else(|_| Value::Array(Vec::new())))
    }
}
