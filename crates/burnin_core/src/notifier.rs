//! Notifier seam: hands a freshly created approval request to whatever
//! delivers it out of band.
//!
//! Delivery itself lives outside this crate. With email enabled the request is
//! written as a notification document into the outbox directory, where an
//! external mailer picks it up; otherwise it is only logged.

use crate::approval::ApprovalRequest;
use crate::config::Config;
use crate::error::{BurninError, Result};
use crate::store::atomic_write;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Receives each new approval request. Failures are reported to the caller,
/// which logs them; they never undo the request.
pub trait Notifier: Send + Sync {
    fn notify(&self, request: &ApprovalRequest) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Used when notification is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, request: &ApprovalRequest) -> Result<()> {
        info!(
            approval_id = %request.id,
            device = %request.device_name,
            "Notification disabled, approval request created but not sent"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Document consumed by the external mailer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundNotification {
    pub approval_id: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: Vec<String>,
    pub approval_link: String,
}

impl OutboundNotification {
    pub fn for_request(request: &ApprovalRequest, recipients: &[String], approval_url: &str) -> Self {
        let approval_link = format!("{}?id={}", approval_url.trim_end_matches('/'), request.id);
        let body = vec![
            "A burn-in tier advancement approval is required.".to_string(),
            format!("Device: {}", request.device_name),
            format!("Current tier: {}", request.current_tier),
            format!("Proposed tier: {}", request.proposed_tier),
            format!("Unit count: {}", request.unit_count),
            format!("Request date: {}", request.request_date.to_rfc3339()),
            format!("Approval ID: {}", request.id),
            format!("Review: {}", approval_link),
            "The device stops counting until this request is decided.".to_string(),
        ];
        Self {
            approval_id: request.id.to_string(),
            recipients: recipients.to_vec(),
            subject: format!(
                "Burn-in tier advancement approval required - {}",
                request.device_name
            ),
            body,
            approval_link,
        }
    }
}

/// Writes `<outbox>/<id>.json` for every request.
#[derive(Debug, Clone)]
pub struct OutboxNotifier {
    dir: PathBuf,
    recipients: Vec<String>,
    approval_url: String,
}

impl OutboxNotifier {
    pub fn new(dir: impl Into<PathBuf>, recipients: Vec<String>, approval_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            recipients,
            approval_url: approval_url.into(),
        }
    }
}

impl Notifier for OutboxNotifier {
    fn notify(&self, request: &ApprovalRequest) -> Result<()> {
        if self.recipients.is_empty() {
            return Err(BurninError::Config(
                "email_settings.recipients.quality is empty".to_string(),
            ));
        }
        let notification = OutboundNotification::for_request(request, &self.recipients, &self.approval_url);
        let path = self.dir.join(format!("{}.json", request.id));
        let json = serde_json::to_vec_pretty(&notification)?;
        atomic_write(&path, &json).map_err(|e| BurninError::io(&path, e))?;
        info!(
            approval_id = %request.id,
            path = %path.display(),
            recipients = self.recipients.len(),
            "Queued approval notification"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "outbox"
    }
}

/// Pick the notifier the configuration asks for.
pub fn notifier_for(config: &Config) -> Box<dyn Notifier> {
    if config.email_settings.enabled {
        Box::new(OutboxNotifier::new(
            config.outbox_dir.clone(),
            config.email_settings.recipients.quality.clone(),
            config.approval_settings.approval_url.clone(),
        ))
    } else {
        Box::new(LogNotifier)
    }
}
