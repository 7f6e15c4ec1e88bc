use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};

/// Somewhere a finished report can be sent.
#[async_trait]
pub trait ReportSender: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, report: &str) -> Result<()>;
}

/// Prints the report to stdout between marker lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSender;

#[async_trait]
impl ReportSender for ConsoleSender {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn send(&self, report: &str) -> Result<()> {
        println!("--- Final report ---");
        println!("{}", report);
        println!("--------------------");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    text: &'a str,
}

/// Posts the report to an incoming-webhook URL (Slack-compatible `{"text": ...}`).
pub struct WebhookSender {
    client: Client,
    webhook_url: String,
}

impl WebhookSender {
    pub fn new(webhook_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            webhook_url,
        })
    }
}

#[async_trait]
impl ReportSender for WebhookSender {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, report: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&WebhookMessage { text: report })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(AppError::Delivery(format!(
                "webhook returned {}: {}",
                status, error_text
            )));
        }

        Ok(())
    }
}

/// Sends `report` to every sender. Failures are logged and do not stop the others.
pub async fn deliver(senders: &[Box<dyn ReportSender>], report: &str) -> usize {
    let mut delivered = 0;
    for sender in senders {
        match sender.send(report).await {
            Ok(()) => {
                tracing::info!("Report delivered via {}", sender.name());
                delivered += 1;
            }
            Err(e) => tracing::error!("Failed to deliver report via {}: {}", sender.name(), e),
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_payload_is_slack_shaped() {
        let payload = serde_json::to_value(WebhookMessage { text: "hello" }).unwrap();
        assert_eq!(payload, serde_json::json!({"text": "hello"}));
    }

    #[tokio::test]
    async fn failing_sender_does_not_block_the_rest() {
        let senders: Vec<Box<dyn ReportSender>> = vec![
            Box::new(WebhookSender::new("http://127.0.0.1:9/hook".to_string()).unwrap()),
            Box::new(ConsoleSender),
        ];
        assert_eq!(deliver(&senders, "report").await, 1);
    }
}
