//! 生命周期事件通知模块
//!
//! 在病例或预约进入新状态后向外部系统推送事件，支持：
//! - 事件订阅管理
//! - 按事件类型过滤和路由
//! - 投递失败计数与自动停用

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use telemed_core::{AppointmentStatus, CaseStatus};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 生命周期事件类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEventType {
    CaseAssigned,
    CaseAccepted,
    CaseRejected,
    CaseFeeSet,
    CaseScheduled,
    CaseInProgress,
    CaseConsultationComplete,
    CaseClosed,
    AppointmentScheduled,
    AppointmentConfirmed,
    AppointmentRescheduled,
    AppointmentCancelled,
    AppointmentCompleted,
    AppointmentNoShow,
}

impl LifecycleEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CaseAssigned => "case.assigned",
            Self::CaseAccepted => "case.accepted",
            Self::CaseRejected => "case.rejected",
            Self::CaseFeeSet => "case.fee_set",
            Self::CaseScheduled => "case.scheduled",
            Self::CaseInProgress => "case.in_progress",
            Self::CaseConsultationComplete => "case.consultation_complete",
            Self::CaseClosed => "case.closed",
            Self::AppointmentScheduled => "appointment.scheduled",
            Self::AppointmentConfirmed => "appointment.confirmed",
            Self::AppointmentRescheduled => "appointment.rescheduled",
            Self::AppointmentCancelled => "appointment.cancelled",
            Self::AppointmentCompleted => "appointment.completed",
            Self::AppointmentNoShow => "appointment.no_show",
        }
    }

    /// 病例状态对应的事件类型，支付等待状态由支付网关自行发布事件
    pub fn from_case_status(status: CaseStatus) -> Option<Self> {
        match status {
            CaseStatus::Assigned => Some(Self::CaseAssigned),
            CaseStatus::Accepted => Some(Self::CaseAccepted),
            CaseStatus::Rejected => Some(Self::CaseRejected),
            CaseStatus::Scheduled => Some(Self::CaseScheduled),
            CaseStatus::PaymentPending => None,
            CaseStatus::InProgress => Some(Self::CaseInProgress),
            CaseStatus::ConsultationComplete => Some(Self::CaseConsultationComplete),
            CaseStatus::Closed => Some(Self::CaseClosed),
        }
    }

    /// 预约状态对应的事件类型
    pub fn from_appointment_status(status: AppointmentStatus) -> Self {
        match status {
            AppointmentStatus::Scheduled => Self::AppointmentScheduled,
            AppointmentStatus::Confirmed => Self::AppointmentConfirmed,
            AppointmentStatus::Rescheduled => Self::AppointmentRescheduled,
            AppointmentStatus::Completed => Self::AppointmentCompleted,
            AppointmentStatus::Cancelled => Self::AppointmentCancelled,
            AppointmentStatus::NoShow => Self::AppointmentNoShow,
        }
    }
}

impl TryFrom<&str> for LifecycleEventType {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self> {
        match value {
            "case.assigned" => Ok(Self::CaseAssigned),
            "case.accepted" => Ok(Self::CaseAccepted),
            "case.rejected" => Ok(Self::CaseRejected),
            "case.fee_set" => Ok(Self::CaseFeeSet),
            "case.scheduled" => Ok(Self::CaseScheduled),
            "case.in_progress" => Ok(Self::CaseInProgress),
            "case.consultation_complete" => Ok(Self::CaseConsultationComplete),
            "case.closed" => Ok(Self::CaseClosed),
            "appointment.scheduled" => Ok(Self::AppointmentScheduled),
            "appointment.confirmed" => Ok(Self::AppointmentConfirmed),
            "appointment.rescheduled" => Ok(Self::AppointmentRescheduled),
            "appointment.cancelled" => Ok(Self::AppointmentCancelled),
            "appointment.completed" => Ok(Self::AppointmentCompleted),
            "appointment.no_show" => Ok(Self::AppointmentNoShow),
            _ => Err(anyhow::anyhow!("Unknown event type: {}", value)),
        }
    }
}

/// 生命周期事件数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub id: String,
    pub event_type: LifecycleEventType,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub data: serde_json::Value,
    pub source: String,
}

impl LifecycleEvent {
    pub fn new(event_type: LifecycleEventType, data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type,
            timestamp: chrono::Utc::now(),
            data,
            source: "telemed-lifecycle".to_string(),
        }
    }
}

/// 事件订阅配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSubscription {
    pub id: String,
    pub url: String,
    pub events: Vec<LifecycleEventType>,
    pub active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub failure_count: u32,
}

impl EventSubscription {
    pub fn new(url: String, events: Vec<LifecycleEventType>, active: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            url,
            events,
            active,
            created_at: chrono::Utc::now(),
            failure_count: 0,
        }
    }

    /// 检查是否对指定事件感兴趣
    pub fn is_interested_in(&self, event_type: &LifecycleEventType) -> bool {
        self.active && self.events.contains(event_type)
    }
}

/// 事件订阅请求
#[derive(Debug, Deserialize)]
pub struct SubscriptionRequest {
    pub url: String,
    pub events: Vec<String>,
    pub active: Option<bool>,
}

/// 事件中心
pub struct EventHub {
    subscriptions: RwLock<HashMap<String, EventSubscription>>,
    client: reqwest::Client,
    max_failures: u32,
}

impl EventHub {
    /// 创建事件中心，连续失败5次后停用订阅
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            client: reqwest::Client::new(),
            max_failures: 5,
        }
    }

    /// 订阅生命周期事件
    pub async fn subscribe(&self, request: SubscriptionRequest) -> Result<String> {
        // 解析事件类型
        let mut events = Vec::new();
        for event_str in request.events {
            match LifecycleEventType::try_from(event_str.as_str()) {
                Ok(event_type) => events.push(event_type),
                Err(e) => {
                    warn!("Invalid event type '{}': {}", event_str, e);
                    continue;
                }
            }
        }

        if events.is_empty() {
            return Err(anyhow::anyhow!("No valid event types specified"));
        }

        let subscription =
            EventSubscription::new(request.url, events, request.active.unwrap_or(true));

        let subscription_id = subscription.id.clone();
        let mut subscriptions = self.subscriptions.write().await;
        subscriptions.insert(subscription_id.clone(), subscription);

        info!("Created event subscription: {}", subscription_id);
        Ok(subscription_id)
    }

    /// 取消订阅
    pub async fn unsubscribe(&self, subscription_id: &str) -> Result<()> {
        let mut subscriptions = self.subscriptions.write().await;
        if subscriptions.remove(subscription_id).is_some() {
            info!("Removed event subscription: {}", subscription_id);
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "Subscription not found: {}",
                subscription_id
            ))
        }
    }

    /// 列出所有订阅
    pub async fn list_subscriptions(&self) -> Vec<EventSubscription> {
        let subscriptions = self.subscriptions.read().await;
        subscriptions.values().cloned().collect()
    }

    /// 发布事件到所有感兴趣的订阅者，返回投递成功数
    pub async fn publish(&self, event: LifecycleEvent) -> Result<usize> {
        debug!("Publishing event: {}", event.event_type.as_str());

        let interested: Vec<EventSubscription> = {
            let subscriptions = self.subscriptions.read().await;
            subscriptions
                .values()
                .filter(|sub| sub.is_interested_in(&event.event_type))
                .cloned()
                .collect()
        };

        if interested.is_empty() {
            debug!(
                "No subscriptions interested in event: {}",
                event.event_type.as_str()
            );
            return Ok(0);
        }

        // 并发投递到所有订阅者
        let mut handles = Vec::new();
        for subscription in interested {
            let subscription_id = subscription.id.clone();
            let client = self.client.clone();
            let event = event.clone();

            let handle = tokio::spawn(async move {
                Self::deliver(&client, &subscription, &event).await
            });
            handles.push((subscription_id, handle));
        }

        // 等待所有投递完成并记录失败
        let mut delivered = 0;
        let mut failed_ids = Vec::new();
        for (subscription_id, handle) in handles {
            match handle.await {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    error!("Event delivery failed for {}: {}", subscription_id, e);
                    failed_ids.push(subscription_id);
                }
                Err(e) => {
                    error!("Event delivery task failed: {}", e);
                    failed_ids.push(subscription_id);
                }
            }
        }

        if !failed_ids.is_empty() {
            let mut subscriptions = self.subscriptions.write().await;
            for id in failed_ids {
                if let Some(subscription) = subscriptions.get_mut(&id) {
                    subscription.failure_count += 1;
                    if subscription.failure_count >= self.max_failures {
                        subscription.active = false;
                        warn!(
                            "Subscription {} deactivated after {} failures",
                            id, subscription.failure_count
                        );
                    }
                }
            }
        }

        Ok(delivered)
    }

    /// 投递单个事件
    async fn deliver(
        client: &reqwest::Client,
        subscription: &EventSubscription,
        event: &LifecycleEvent,
    ) -> Result<()> {
        let response = client
            .post(&subscription.url)
            .header("User-Agent", "Telemed-Webhook/1.0")
            .header("X-Telemed-Event", event.event_type.as_str())
            .json(event)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send event: {}", e))?;

        if response.status().is_success() {
            info!("Successfully delivered event to: {}", subscription.url);
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "Event delivery failed with status: {}",
                response.status()
            ))
        }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_subscription() {
        let hub = EventHub::new();

        let request = SubscriptionRequest {
            url: "https://example.com/webhook".to_string(),
            events: vec!["case.accepted".to_string(), "case.closed".to_string()],
            active: Some(true),
        };

        let subscription_id = hub.subscribe(request).await.unwrap();
        assert!(!subscription_id.is_empty());

        let subscriptions = hub.list_subscriptions().await;
        assert_eq!(subscriptions.len(), 1);
        assert_eq!(subscriptions[0].events.len(), 2);

        hub.unsubscribe(&subscription_id).await.unwrap();
        assert!(hub.list_subscriptions().await.is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_rejects_unknown_events_only() {
        let hub = EventHub::new();

        let request = SubscriptionRequest {
            url: "https://example.com/webhook".to_string(),
            events: vec!["case.exploded".to_string()],
            active: None,
        };

        assert!(hub.subscribe(request).await.is_err());
    }

    #[tokio::test]
    async fn test_inactive_subscription_is_not_interested() {
        let subscription = EventSubscription::new(
            "https://example.com/webhook".to_string(),
            vec![LifecycleEventType::CaseAccepted],
            false,
        );
        assert!(!subscription.is_interested_in(&LifecycleEventType::CaseAccepted));
    }

    #[test]
    fn test_event_type_round_trip() {
        let all = [
            LifecycleEventType::CaseAssigned,
            LifecycleEventType::CaseAccepted,
            LifecycleEventType::CaseRejected,
            LifecycleEventType::CaseFeeSet,
            LifecycleEventType::CaseScheduled,
            LifecycleEventType::CaseInProgress,
            LifecycleEventType::CaseConsultationComplete,
            LifecycleEventType::CaseClosed,
            LifecycleEventType::AppointmentScheduled,
            LifecycleEventType::AppointmentConfirmed,
            LifecycleEventType::AppointmentRescheduled,
            LifecycleEventType::AppointmentCancelled,
            LifecycleEventType::AppointmentCompleted,
            LifecycleEventType::AppointmentNoShow,
        ];
        for event_type in all {
            let parsed = LifecycleEventType::try_from(event_type.as_str()).unwrap();
            assert_eq!(parsed, event_type);
        }
        assert!(LifecycleEventType::try_from("study.created").is_err());
    }

    #[test]
    fn test_status_to_event_mapping() {
        assert_eq!(
            LifecycleEventType::from_case_status(CaseStatus::Accepted),
            Some(LifecycleEventType::CaseAccepted)
        );
        assert_eq!(
            LifecycleEventType::from_case_status(CaseStatus::PaymentPending),
            None
        );
        assert_eq!(
            LifecycleEventType::from_appointment_status(AppointmentStatus::NoShow),
            LifecycleEventType::AppointmentNoShow
        );
    }
}
