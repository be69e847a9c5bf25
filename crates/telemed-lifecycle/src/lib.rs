//! # Telemed生命周期模块
//!
//! 提供会诊病例与预约生命周期的完整决策核心，包括：
//! - 病例状态机：管理病例从分配到结案的状态转换与守卫
//! - 预约状态机：管理预约状态与时间窗口动作资格
//! - 生命周期协调器：组合两台状态机回答"此刻哪些动作可用"
//! - 业务规则配置：费用区间、理由长度与时间窗口
//! - 病例工作列表：医生端列表页的过滤、排序与统计

pub mod appointment_machine;
pub mod case_machine;
pub mod clock;
pub mod coordinator;
pub mod rules;
pub mod worklist;

// 重新导出主要类型
pub use appointment_machine::{
    AppointmentAction, AppointmentActionKind, AppointmentStateMachine,
};
pub use case_machine::{CaseAction, CaseActionKind, CaseStateMachine};
pub use clock::{ClockSource, FixedClock, SystemClock};
pub use coordinator::{AvailableActions, LifecycleCoordinator};
pub use rules::LifecycleRules;
pub use worklist::{case_stats, query_cases, upcoming_appointments, CaseFilter, CaseListStats};
