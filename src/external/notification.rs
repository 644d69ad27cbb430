use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationKind {
    /// 收到一笔待确认的捐赠
    DonationReceived { donation_id: i32 },
    /// 接收方确认了捐赠（通知接收方本人）
    DonationConfirmed { donation_id: i32 },
    /// 发送方的捐赠已被接收方确认
    DonationAccepted { donation_id: i32 },
    DreamFulfilled { dream_id: i32 },
    DreamMaker,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, user_id: i32, kind: &NotificationKind) -> AppResult<()>;
}

pub type SharedNotifier = Arc<dyn NotificationSink>;

/// 只写日志
#[derive(Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, user_id: i32, kind: &NotificationKind) -> AppResult<()> {
        log::info!(
            "notification user_id={} payload={}",
            user_id,
            serde_json::to_string(kind)?
        );
        Ok(())
    }
}

/// 推送到通知服务的 webhook
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> AppResult<Self> {
        let client = Client::builder()
            .user_agent("dreamfund-backend/notifications")
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn notify(&self, user_id: i32, kind: &NotificationKind) -> AppResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "user_id": user_id, "event": kind }))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(AppError::ExternalApiError(format!(
                "notification webhook returned {status}: {error_text}"
            )))
        }
    }
}

/// 事务内暂存的通知，提交后再发送
#[derive(Debug, Default)]
pub struct Outbox {
    pending: Vec<(i32, NotificationKind)>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, user_id: i32, kind: NotificationKind) {
        self.pending.push((user_id, kind));
    }

    /// 发送失败只记日志，不影响已提交的资金状态
    pub async fn flush(self, sink: &dyn NotificationSink) {
        for (user_id, kind) in self.pending {
            if let Err(e) = sink.notify(user_id, &kind).await {
                log::warn!("Failed to notify user {}: {:?} ({})", user_id, kind, e);
            }
        }
    }
}
