//! Report composition and the delivery boundary.
//!
//! The report is deterministic text with fixed section markers so automated
//! consumers can assert on structure. Delivery is a separate collaborator
//! behind [`ReportSink`]; the report text is always returned to the caller
//! whether or not delivery succeeds.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{error, info};

use crate::analysis::{self, PatternSet};
use crate::config::DeliveryConfig;
use crate::index::VectorIndex;
use crate::models::{ConflictFinding, ExpirationFinding};

pub const REPORT_TITLE: &str = "Daily Contract Management Report";
pub const EXPIRATIONS_MARKER: &str = "APPROACHING CONTRACT EXPIRATIONS";
pub const CONFLICTS_MARKER: &str = "CONFLICTS DETECTED";

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery transport failed: {0}")]
    Transport(String),
    #[error("delivery rejected: {0}")]
    Rejected(String),
}

/// Run both analysis passes and compose the report.
///
/// A bulk-read fault from the index is logged and the affected section
/// composes as empty; the operator sees the fault in the logs while the
/// report itself stays well-formed.
pub async fn generate(
    index: &dyn VectorIndex,
    patterns: &PatternSet,
    now: DateTime<Utc>,
    today: NaiveDate,
    window_days: i64,
) -> String {
    info!("scanning corpus for approaching expirations");
    let expirations = analysis::extract_expirations(index, patterns, today, window_days)
        .await
        .unwrap_or_else(|e| {
            error!("expiration scan failed: {}", e);
            Vec::new()
        });

    info!("scanning corpus for cross-document conflicts");
    let conflicts = analysis::detect_conflicts(index, patterns)
        .await
        .unwrap_or_else(|e| {
            error!("conflict scan failed: {}", e);
            Vec::new()
        });

    info!(
        "report generated: {} expirations, {} conflicts",
        expirations.len(),
        conflicts.len()
    );
    compose_report(now, window_days, &expirations, &conflicts)
}

/// Deterministic textual composition of the findings.
pub fn compose_report(
    generated_at: DateTime<Utc>,
    window_days: i64,
    expirations: &[ExpirationFinding],
    conflicts: &[ConflictFinding],
) -> String {
    let mut report = format!(
        "{}\nGenerated: {}\n\n",
        REPORT_TITLE,
        generated_at.format("%Y-%m-%d %H:%M:%S")
    );

    report.push_str(&format!(
        "=== {} (Next {} days) ===\n",
        EXPIRATIONS_MARKER, window_days
    ));
    if expirations.is_empty() {
        report.push_str(&format!(
            "No contracts expiring in the next {} days.\n",
            window_days
        ));
    } else {
        for exp in expirations {
            report.push_str(&format!(
                "• {}: Expires on {} ({} days)\n",
                exp.document,
                exp.date.format("%Y-%m-%d"),
                exp.days_until_expiration
            ));
        }
    }

    report.push_str(&format!("\n=== {} ===\n", CONFLICTS_MARKER));
    if conflicts.is_empty() {
        report.push_str("No conflicts detected.\n");
    } else {
        for conflict in conflicts {
            report.push_str(&format!("• Company: {}\n", conflict.company));
            report.push_str(&format!("  Issue: {}\n", conflict.issue));
            report.push_str(&format!(
                "  Documents involved: {}\n",
                conflict.documents.join(", ")
            ));
            for (address, docs) in &conflict.addresses {
                report.push_str(&format!(
                    "  Address '{}' found in: {}\n",
                    address,
                    docs.join(", ")
                ));
            }
        }
    }

    report
}

/// Delivery collaborator. The report body is an opaque payload; the sink
/// must report failure explicitly, never swallow it.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn deliver(&self, subject: &str, body: &str) -> Result<(), DeliveryError>;
}

/// Posts the report to a notification webhook as a JSON payload. The
/// `from`/`to` fields come from configuration and pass through verbatim.
pub struct WebhookSink {
    client: reqwest::Client,
    endpoint: String,
    from: String,
    to: String,
}

impl WebhookSink {
    pub fn new(config: &DeliveryConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            from: config.from.clone(),
            to: config.to.clone(),
        })
    }
}

#[async_trait]
impl ReportSink for WebhookSink {
    async fn deliver(&self, subject: &str, body: &str) -> Result<(), DeliveryError> {
        let payload = serde_json::json!({
            "from": self.from,
            "to": self.to,
            "subject": subject,
            "body": body,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected(format!("{}: {}", status, detail)));
        }

        Ok(())
    }
}
