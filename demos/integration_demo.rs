//! 集成模块演示程序
//!
//! 展示集成模块的核心功能：
//! - REST服务连接器配置
//! - 生命周期事件订阅与发布

use anyhow::Result;
use serde_json::json;
use telemed_core::{AppointmentStatus, CaseStatus};
use telemed_integration::events::SubscriptionRequest;
use telemed_integration::rest::{EndpointConfig, RestAppointmentService, RestCaseService, ServiceAuth};
use telemed_integration::{EventHub, LifecycleEvent, LifecycleEventType};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    info!("🚀 启动Telemed集成模块演示");

    demo_rest_connectors()?;
    demo_event_hub().await?;

    info!("✅ 集成模块演示完成");
    Ok(())
}

/// REST连接器配置演示
fn demo_rest_connectors() -> Result<()> {
    info!("\n📋 REST连接器演示");

    let config = EndpointConfig {
        base_url: "https://api.telemed.example.com/v1".to_string(),
        auth: ServiceAuth::BearerToken {
            token: "demo-token".to_string(),
        },
        timeout_seconds: 10,
    };
    info!("   端点: {}", config.base_url);

    let _case_service = RestCaseService::new(config.clone())?;
    let _appointment_service = RestAppointmentService::new(config)?;
    info!("✅ 病例与预约连接器已就绪");

    let api_key_config = EndpointConfig {
        auth: ServiceAuth::ApiKey {
            key: "demo-key".to_string(),
            header: None,
        },
        ..Default::default()
    };
    info!("   备用端点: {} (API Key认证)", api_key_config.base_url);

    Ok(())
}

/// 事件订阅与发布演示
async fn demo_event_hub() -> Result<()> {
    info!("\n📋 生命周期事件演示");

    let hub = EventHub::new();

    // 订阅病例关键节点事件
    let subscription_id = hub
        .subscribe(SubscriptionRequest {
            url: "http://localhost:9090/hooks/lifecycle".to_string(),
            events: vec![
                "case.accepted".to_string(),
                "case.fee_set".to_string(),
                "case.closed".to_string(),
                "appointment.no_show".to_string(),
            ],
            active: Some(true),
        })
        .await?;
    info!("✅ 已创建订阅: {}", subscription_id);

    for subscription in hub.list_subscriptions().await {
        info!(
            "   订阅 {} -> {} ({} 种事件)",
            subscription.id,
            subscription.url,
            subscription.events.len()
        );
    }

    // 状态到事件类型的映射
    if let Some(event_type) = LifecycleEventType::from_case_status(CaseStatus::Accepted) {
        info!("   病例接诊 -> {}", event_type.as_str());
    }
    if LifecycleEventType::from_case_status(CaseStatus::PaymentPending).is_none() {
        info!("   支付等待状态不发布生命周期事件");
    }
    let no_show = LifecycleEventType::from_appointment_status(AppointmentStatus::NoShow);
    info!("   预约爽约 -> {}", no_show.as_str());

    // 发布事件，没有接收端时投递失败会被计数
    let event = LifecycleEvent::new(
        LifecycleEventType::CaseAccepted,
        json!({
            "case_number": "TMC-20240603-1a2b3c4d",
            "doctor_id": "d2cf5a1e-3e6b-4a88-9b1a-0f4c2a7d9e11",
        }),
    );
    match hub.publish(event).await {
        Ok(delivered) => info!("✅ 事件已发布，成功投递 {} 个订阅者", delivered),
        Err(e) => warn!("❌ 事件发布失败: {}", e),
    }

    for subscription in hub.list_subscriptions().await {
        info!(
            "   订阅 {} 失败计数: {}",
            subscription.id, subscription.failure_count
        );
    }

    Ok(())
}
