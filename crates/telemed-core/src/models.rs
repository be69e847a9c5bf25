//! 核心数据模型定义

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 会诊病例
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub id: Uuid,
    pub case_number: String, // 平台内部病例编号
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,       // 分配的会诊医生
    pub status: CaseStatus,
    pub description: Option<String>,   // 病情主诉
    pub consultation_fee: Option<f64>, // 会诊费用（平台结算货币）
    pub urgency_level: UrgencyLevel,
    pub report_finalized: bool, // 会诊报告是否已定稿
    pub assigned_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Case {
    /// 会诊费是否已设置（缺失或为零均视为未设置）
    pub fn fee_is_set(&self) -> bool {
        self.consultation_fee.map(|fee| fee > 0.0).unwrap_or(false)
    }
}

/// 病例状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CaseStatus {
    Assigned,             // 已分配
    Accepted,             // 已接诊
    Scheduled,            // 已排期
    PaymentPending,       // 等待支付（由外部支付流程推进）
    InProgress,           // 会诊中
    ConsultationComplete, // 会诊完成
    Closed,               // 已结案
    Rejected,             // 已拒诊
}

impl CaseStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaseStatus::Closed | CaseStatus::Rejected)
    }
}

/// 紧急程度
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UrgencyLevel {
    Low,      // 低
    Medium,   // 中
    High,     // 高
    Critical, // 危急
}

/// 会诊预约
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub case_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub status: AppointmentStatus,
    pub scheduled_time: DateTime<Utc>, // 会诊开始时间
    pub duration_minutes: u32,
    pub consultation_type: ConsultationType,
    pub reschedule_count: u32,            // 改期次数，只增不减
    pub meeting_link: Option<String>,     // 会议链接，加入会诊时必需
    pub joined_at: Option<DateTime<Utc>>, // 首位参与者加入时间（由外部服务记录）
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// 预约的计划结束时间
    pub fn end_time(&self) -> DateTime<Utc> {
        self.scheduled_time + Duration::minutes(self.duration_minutes as i64)
    }
}

/// 预约状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentStatus {
    Scheduled,   // 已排期
    Confirmed,   // 已确认
    Rescheduled, // 已改期
    Completed,   // 已完成
    Cancelled,   // 已取消
    NoShow,      // 爽约
}

impl AppointmentStatus {
    /// 是否为终态（终态预约不再发生任何转换）
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }
}

/// 会诊方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ConsultationType {
    VideoConsultation, // 平台内置视频
    PhoneCall,         // 电话
    Zoom,              // Zoom会议
    Whatsapp,          // WhatsApp通话
}

/// 新建预约请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub case_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub scheduled_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub consultation_type: ConsultationType,
    pub meeting_link: Option<String>,
}

/// 预约改期请求
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RescheduleRequest {
    pub new_time: DateTime<Utc>,
    pub reason: String,
    pub new_duration: Option<u32>, // 不给出则沿用原时长
}
