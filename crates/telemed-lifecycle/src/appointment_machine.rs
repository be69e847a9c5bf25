//! 预约状态机
//!
//! 管理会诊预约的状态转换与时间窗口动作资格。所有时间比较都针对
//! 显式传入的当前时刻进行，本模块自身不读取系统时钟。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use telemed_core::{
    Appointment, AppointmentStatus, RescheduleRequest, Result, ScheduleRequest, TelemedError,
};
use uuid::Uuid;

use crate::rules::LifecycleRules;

/// 预约动作（带业务参数）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum AppointmentAction {
    /// 加入会诊，仅校验入口资格，不改变状态
    Join,
    /// 改期
    Reschedule(RescheduleRequest),
    /// 取消，必须给出理由
    Cancel { reason: String },
    /// 完成会诊
    Complete,
    /// 标记爽约
    MarkNoShow,
}

impl AppointmentAction {
    /// 返回动作种类
    pub fn kind(&self) -> AppointmentActionKind {
        match self {
            AppointmentAction::Join => AppointmentActionKind::Join,
            AppointmentAction::Reschedule(_) => AppointmentActionKind::Reschedule,
            AppointmentAction::Cancel { .. } => AppointmentActionKind::Cancel,
            AppointmentAction::Complete => AppointmentActionKind::Complete,
            AppointmentAction::MarkNoShow => AppointmentActionKind::MarkNoShow,
        }
    }
}

/// 预约动作种类（无参数，用于可用动作集合）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentActionKind {
    Join,
    Reschedule,
    Cancel,
    Complete,
    MarkNoShow,
}

/// 预约状态机
#[derive(Debug, Clone)]
pub struct AppointmentStateMachine {
    rules: LifecycleRules,
}

impl AppointmentStateMachine {
    /// 使用默认业务规则创建状态机
    pub fn new() -> Self {
        Self::with_rules(LifecycleRules::default())
    }

    /// 使用指定业务规则创建状态机
    pub fn with_rules(rules: LifecycleRules) -> Self {
        Self { rules }
    }

    /// 当前生效的业务规则
    pub fn rules(&self) -> &LifecycleRules {
        &self.rules
    }

    /// 计算预约快照在指定时刻可执行的动作种类
    pub fn eligible_actions(
        &self,
        appointment: &Appointment,
        now: DateTime<Utc>,
    ) -> HashSet<AppointmentActionKind> {
        let mut actions = HashSet::new();

        // 终态预约不再提供任何动作
        if appointment.status.is_terminal() {
            return actions;
        }

        if Self::awaiting_start(appointment.status)
            && appointment.meeting_link.is_some()
            && self.join_window_open(appointment, now)
        {
            actions.insert(AppointmentActionKind::Join);
        }

        if Self::active_for_update(appointment.status) {
            actions.insert(AppointmentActionKind::Reschedule);
            actions.insert(AppointmentActionKind::Cancel);

            if now >= appointment.scheduled_time {
                actions.insert(AppointmentActionKind::Complete);
            }
        }

        if Self::awaiting_start(appointment.status)
            && appointment.joined_at.is_none()
            && self.no_show_grace_elapsed(appointment, now)
        {
            actions.insert(AppointmentActionKind::MarkNoShow);
        }

        actions
    }

    /// 校验动作并返回更新后的预约副本，不修改输入快照
    ///
    /// `Join` 动作只做资格校验，返回的副本与输入一致；其余动作返回
    /// 应用转换后的新快照，由调用方提交给外部服务落库。
    pub fn validate(
        &self,
        appointment: &Appointment,
        action: &AppointmentAction,
        now: DateTime<Utc>,
    ) -> Result<Appointment> {
        self.check_status(appointment, action.kind())?;

        match action {
            AppointmentAction::Join => {
                if appointment.meeting_link.is_none() {
                    return Err(TelemedError::GuardFailed(
                        "meeting link is not available yet".to_string(),
                    ));
                }
                if !self.join_window_open(appointment, now) {
                    return Err(TelemedError::GuardFailed(format!(
                        "join window is open from {} minutes before to {} minutes after the scheduled time",
                        self.rules.join_before_minutes, self.rules.join_after_minutes
                    )));
                }
                Ok(appointment.clone())
            }
            AppointmentAction::Reschedule(request) => {
                if !self.rules.reason_acceptable(&request.reason) {
                    return Err(TelemedError::GuardFailed(format!(
                        "reschedule reason must be at least {} characters",
                        self.rules.min_reason_chars
                    )));
                }
                if request.new_time <= now {
                    return Err(TelemedError::GuardFailed(
                        "new appointment time must be in the future".to_string(),
                    ));
                }
                if let Some(minutes) = request.new_duration {
                    if !self.rules.duration_allowed(minutes) {
                        return Err(TelemedError::GuardFailed(format!(
                            "duration {} is not allowed, expected one of {:?}",
                            minutes, self.rules.allowed_durations
                        )));
                    }
                }

                let mut next = appointment.clone();
                next.status = AppointmentStatus::Rescheduled;
                next.scheduled_time = request.new_time;
                if let Some(minutes) = request.new_duration {
                    next.duration_minutes = minutes;
                }
                next.reschedule_count += 1;
                next.joined_at = None;
                next.updated_at = now;
                Ok(next)
            }
            AppointmentAction::Cancel { reason } => {
                if !self.rules.reason_acceptable(reason) {
                    return Err(TelemedError::GuardFailed(format!(
                        "cancellation reason must be at least {} characters",
                        self.rules.min_reason_chars
                    )));
                }

                let mut next = appointment.clone();
                next.status = AppointmentStatus::Cancelled;
                next.updated_at = now;
                Ok(next)
            }
            AppointmentAction::Complete => {
                if now < appointment.scheduled_time {
                    return Err(TelemedError::GuardFailed(
                        "consultation has not reached its scheduled time".to_string(),
                    ));
                }

                let mut next = appointment.clone();
                next.status = AppointmentStatus::Completed;
                next.updated_at = now;
                Ok(next)
            }
            AppointmentAction::MarkNoShow => {
                if appointment.joined_at.is_some() {
                    return Err(TelemedError::GuardFailed(
                        "a participant already joined this consultation".to_string(),
                    ));
                }
                if !self.no_show_grace_elapsed(appointment, now) {
                    return Err(TelemedError::GuardFailed(format!(
                        "no-show can be marked only after a {} minute grace period",
                        self.rules.no_show_grace_minutes
                    )));
                }

                let mut next = appointment.clone();
                next.status = AppointmentStatus::NoShow;
                next.updated_at = now;
                Ok(next)
            }
        }
    }

    /// 校验新建预约请求并返回预约草案
    pub fn validate_schedule(
        &self,
        request: &ScheduleRequest,
        now: DateTime<Utc>,
    ) -> Result<Appointment> {
        if request.scheduled_time <= now {
            return Err(TelemedError::GuardFailed(
                "appointment time must be in the future".to_string(),
            ));
        }
        if !self.rules.duration_allowed(request.duration_minutes) {
            return Err(TelemedError::GuardFailed(format!(
                "duration {} is not allowed, expected one of {:?}",
                request.duration_minutes, self.rules.allowed_durations
            )));
        }
        if let Some(link) = &request.meeting_link {
            if !telemed_core::utils::is_valid_meeting_link(link) {
                return Err(TelemedError::GuardFailed(
                    "meeting link must be an http(s) URL".to_string(),
                ));
            }
        }

        Ok(Appointment {
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
        })
    }

    /// 加入窗口是否开放，边界含端点
    fn join_window_open(&self, appointment: &Appointment, now: DateTime<Utc>) -> bool {
        let opens = appointment.scheduled_time - Duration::minutes(self.rules.join_before_minutes);
        let closes = appointment.scheduled_time + Duration::minutes(self.rules.join_after_minutes);
        now >= opens && now <= closes
    }

    /// 爽约宽限期是否已过，严格晚于边界
    fn no_show_grace_elapsed(&self, appointment: &Appointment, now: DateTime<Utc>) -> bool {
        now > appointment.scheduled_time + Duration::minutes(self.rules.no_show_grace_minutes)
    }

    /// 尚未开始的预约，可加入、可标记爽约
    fn awaiting_start(status: AppointmentStatus) -> bool {
        matches!(
            status,
            AppointmentStatus::Scheduled | AppointmentStatus::Confirmed
        )
    }

    /// 仍可改动的预约，可改期、取消、完成
    fn active_for_update(status: AppointmentStatus) -> bool {
        matches!(
            status,
            AppointmentStatus::Scheduled
                | AppointmentStatus::Confirmed
                | AppointmentStatus::Rescheduled
        )
    }

    /// 状态门检查，不涉及时间与参数
    fn check_status(&self, appointment: &Appointment, kind: AppointmentActionKind) -> Result<()> {
        let allowed = match kind {
            AppointmentActionKind::Join | AppointmentActionKind::MarkNoShow => {
                Self::awaiting_start(appointment.status)
            }
            AppointmentActionKind::Reschedule
            | AppointmentActionKind::Cancel
            | AppointmentActionKind::Complete => Self::active_for_update(appointment.status),
        };

        if !allowed {
            tracing::warn!(
                "Appointment {} in status {:?} cannot apply action {:?}",
                appointment.id, appointment.status, kind
            );
            return Err(TelemedError::InvalidState {
                status: format!("{:?}", appointment.status),
                action: format!("{:?}", kind),
            });
        }
        Ok(())
    }
}

impl Default for AppointmentStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
