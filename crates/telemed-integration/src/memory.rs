//! 内存服务实现
//!
//! 基于共享内存存储的服务实现，用于本地开发与测试。病例服务与
//! 预约服务持有同一个存储句柄，排期写入会同时把病例置为已排期。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use telemed_core::{
    Appointment, AppointmentStatus, Case, CaseStatus, RescheduleRequest, Result,
    ScheduleRequest, TelemedError,
};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::services::{AppointmentService, CaseService};

#[derive(Debug, Default)]
struct StoreInner {
    cases: HashMap<Uuid, Case>,
    appointments: HashMap<Uuid, Appointment>,
}

/// 共享内存存储
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl InMemoryStore {
    /// 创建空存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置病例
    pub async fn seed_case(&self, case: Case) {
        let mut inner = self.inner.write().await;
        inner.cases.insert(case.id, case);
    }

    /// 预置预约
    pub async fn seed_appointment(&self, appointment: Appointment) {
        let mut inner = self.inner.write().await;
        inner.appointments.insert(appointment.id, appointment);
    }

    async fn update_case<F>(&self, id: Uuid, apply: F) -> Result<Case>
    where
        F: FnOnce(&mut Case),
    {
        let mut inner = self.inner.write().await;
        let case = inner
            .cases
            .get_mut(&id)
            .ok_or_else(|| TelemedError::NotFound(format!("case {}", id)))?;
        apply(case);
        case.updated_at = Utc::now();
        Ok(case.clone())
    }

    async fn update_appointment<F>(&self, id: Uuid, apply: F) -> Result<Appointment>
    where
        F: FnOnce(&mut Appointment),
    {
        let mut inner = self.inner.write().await;
        let appointment = inner
            .appointments
            .get_mut(&id)
            .ok_or_else(|| TelemedError::NotFound(format!("appointment {}", id)))?;
        apply(appointment);
        appointment.updated_at = Utc::now();
        Ok(appointment.clone())
    }
}

/// 内存病例服务
#[derive(Debug, Clone)]
pub struct InMemoryCaseService {
    store: InMemoryStore,
}

impl InMemoryCaseService {
    /// 基于共享存储创建病例服务
    pub fn new(store: InMemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CaseService for InMemoryCaseService {
    async fn get_case(&self, id: Uuid) -> Result<Case> {
        let inner = self.store.inner.read().await;
        inner
            .cases
            .get(&id)
            .cloned()
            .ok_or_else(|| TelemedError::NotFound(format!("case {}", id)))
    }

    async fn list_doctor_cases(&self, doctor_id: Uuid) -> Result<Vec<Case>> {
        let inner = self.store.inner.read().await;
        let cases = inner
            .cases
            .values()
            .filter(|c| c.doctor_id == Some(doctor_id))
            .cloned()
            .collect();
        Ok(cases)
    }

    async fn accept_case(&self, id: Uuid) -> Result<Case> {
        let case = self
            .store
            .update_case(id, |case| {
                case.status = CaseStatus::Accepted;
                case.accepted_at = Some(Utc::now());
            })
            .await?;
        info!("Case {} accepted", case.case_number);
        Ok(case)
    }

    async fn reject_case(&self, id: Uuid, reason: &str) -> Result<Case> {
        let case = self
            .store
            .update_case(id, |case| {
                case.status = CaseStatus::Rejected;
            })
            .await?;
        info!("Case {} rejected: {}", case.case_number, reason);
        Ok(case)
    }

    async fn set_case_fee(&self, id: Uuid, fee: f64) -> Result<Case> {
        let case = self
            .store
            .update_case(id, |case| {
                case.consultation_fee = Some(fee);
            })
            .await?;
        debug!("Case {} fee set to {}", case.case_number, fee);
        Ok(case)
    }

    async fn start_consultation(&self, id: Uuid) -> Result<Case> {
        self.store
            .update_case(id, |case| {
                case.status = CaseStatus::InProgress;
            })
            .await
    }

    async fn complete_consultation(&self, id: Uuid) -> Result<Case> {
        self.store
            .update_case(id, |case| {
                case.status = CaseStatus::ConsultationComplete;
            })
            .await
    }

    async fn finalize_report(&self, id: Uuid) -> Result<Case> {
        self.store
            .update_case(id, |case| {
                case.report_finalized = true;
            })
            .await
    }

    async fn close_case(&self, id: Uuid) -> Result<Case> {
        let case = self
            .store
            .update_case(id, |case| {
                case.status = CaseStatus::Closed;
                case.closed_at = Some(Utc::now());
            })
            .await?;
        info!("Case {} closed", case.case_number);
        Ok(case)
    }
}

/// 内存预约服务
#[derive(Debug, Clone)]
pub struct InMemoryAppointmentService {
    store: InMemoryStore,
}

impl InMemoryAppointmentService {
    /// 基于共享存储创建预约服务
    pub fn new(store: InMemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AppointmentService for InMemoryAppointmentService {
    async fn get_appointment(&self, id: Uuid) -> Result<Appointment> {
        let inner = self.store.inner.read().await;
        inner
            .appointments
            .get(&id)
            .cloned()
            .ok_or_else(|| TelemedError::NotFound(format!("appointment {}", id)))
    }

    async fn get_active_appointment(&self, case_id: Uuid) -> Result<Option<Appointment>> {
        let inner = self.store.inner.read().await;
        let appointment = inner
            .appointments
            .values()
            .find(|a| a.case_id == case_id && !a.status.is_terminal())
            .cloned();
        Ok(appointment)
    }

    async fn schedule_appointment(&self, request: &ScheduleRequest) -> Result<Appointment> {
        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            case_id: request.case_id,
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            status: AppointmentStatus::Scheduled,
            scheduled_time: request.scheduled_time,
            duration_minutes: request.duration_minutes,
            consultation_type: request.consultation_type,
            reschedule_count: 0,
            meeting_link: request.meeting_link.clone(),
            joined_at: None,
            created_at: now,
            updated_at: now,
        };

        let mut inner = self.store.inner.write().await;
        let case = inner
            .cases
            .get_mut(&request.case_id)
            .ok_or_else(|| TelemedError::NotFound(format!("case {}", request.case_id)))?;
        case.status = CaseStatus::Scheduled;
        case.updated_at = now;
        inner
            .appointments
            .insert(appointment.id, appointment.clone());

        info!(
            "Appointment {} scheduled for case {}",
            appointment.id, request.case_id
        );
        Ok(appointment)
    }

    async fn reschedule_appointment(
        &self,
        id: Uuid,
        request: &RescheduleRequest,
    ) -> Result<Appointment> {
        let appointment = self
            .store
            .update_appointment(id, |appointment| {
                appointment.status = AppointmentStatus::Rescheduled;
                appointment.scheduled_time = request.new_time;
                if let Some(duration) = request.new_duration {
                    appointment.duration_minutes = duration;
                }
                appointment.reschedule_count += 1;
                appointment.joined_at = None;
            })
            .await?;
        info!(
            "Appointment {} rescheduled to {}: {}",
            id, request.new_time, request.reason
        );
        Ok(appointment)
    }

    async fn cancel_appointment(&self, id: Uuid, reason: &str) -> Result<Appointment> {
        let appointment = self
            .store
            .update_appointment(id, |appointment| {
                appointment.status = AppointmentStatus::Cancelled;
            })
            .await?;
        info!("Appointment {} cancelled: {}", id, reason);
        Ok(appointment)
    }

    async fn complete_appointment(&self, id: Uuid) -> Result<Appointment> {
        self.store
            .update_appointment(id, |appointment| {
                appointment.status = AppointmentStatus::Completed;
            })
            .await
    }

    async fn mark_no_show(&self, id: Uuid) -> Result<Appointment> {
        self.store
            .update_appointment(id, |appointment| {
                appointment.status = AppointmentStatus::NoShow;
            })
            .await
    }

    async fn record_join(&self, id: Uuid) -> Result<Appointment> {
        self.store
            .update_appointment(id, |appointment| {
                appointment.joined_at = Some(Utc::now());
            })
            .await
    }
}
