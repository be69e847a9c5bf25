//! # Telemed集成模块
//!
//! 提供与平台后端及外部系统的集成功能，包括：
//! - 病例与预约服务契约，生命周期决策与持久化解耦
//! - RESTful服务连接器，对接平台后端
//! - 共享内存实现，用于本地开发与测试
//! - 生命周期事件通知系统，实现实时事件推送

pub mod events;
pub mod memory;
pub mod rest;
pub mod services;

pub use events::{EventHub, EventSubscription, LifecycleEvent, LifecycleEventType};
pub use memory::{InMemoryAppointmentService, InMemoryCaseService, InMemoryStore};
pub use rest::{EndpointConfig, RestAppointmentService, RestCaseService, ServiceAuth};
pub use services::{AppointmentService, CaseService};
