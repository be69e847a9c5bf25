//! 外部服务契约
//!
//! 病例与预约记录由外部持久化服务持有，协调器只通过这里定义的
//! 异步接口消费它们。接口不约定任何传输格式，REST实现与内存实现
//! 都在本crate内提供。

use async_trait::async_trait;
use telemed_core::{Appointment, Case, RescheduleRequest, Result, ScheduleRequest};
use uuid::Uuid;

/// 病例服务接口
#[async_trait]
pub trait CaseService: Send + Sync {
    /// 获取单个病例
    async fn get_case(&self, id: Uuid) -> Result<Case>;

    /// 获取医生名下的全部病例
    async fn list_doctor_cases(&self, doctor_id: Uuid) -> Result<Vec<Case>>;

    /// 接诊
    async fn accept_case(&self, id: Uuid) -> Result<Case>;

    /// 拒诊
    async fn reject_case(&self, id: Uuid, reason: &str) -> Result<Case>;

    /// 设置会诊费
    async fn set_case_fee(&self, id: Uuid, fee: f64) -> Result<Case>;

    /// 开始会诊
    async fn start_consultation(&self, id: Uuid) -> Result<Case>;

    /// 完成会诊
    async fn complete_consultation(&self, id: Uuid) -> Result<Case>;

    /// 会诊报告定稿
    async fn finalize_report(&self, id: Uuid) -> Result<Case>;

    /// 结案
    async fn close_case(&self, id: Uuid) -> Result<Case>;
}

/// 预约服务接口
#[async_trait]
pub trait AppointmentService: Send + Sync {
    /// 获取单个预约
    async fn get_appointment(&self, id: Uuid) -> Result<Appointment>;

    /// 获取病例当前的活跃预约，没有则返回None
    async fn get_active_appointment(&self, case_id: Uuid) -> Result<Option<Appointment>>;

    /// 新建预约
    async fn schedule_appointment(&self, request: &ScheduleRequest) -> Result<Appointment>;

    /// 预约改期
    async fn reschedule_appointment(
        &self,
        id: Uuid,
        request: &RescheduleRequest,
    ) -> Result<Appointment>;

    /// 取消预约
    async fn cancel_appointment(&self, id: Uuid, reason: &str) -> Result<Appointment>;

    /// 完成预约
    async fn complete_appointment(&self, id: Uuid) -> Result<Appointment>;

    /// 标记爽约
    async fn mark_no_show(&self, id: Uuid) -> Result<Appointment>;

    /// 记录参与者加入
    async fn record_join(&self, id: Uuid) -> Result<Appointment>;
}
