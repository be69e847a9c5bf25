//! 生命周期协调器
//!
//! 组合病例与预约两台状态机，为医生端界面回答"此刻有哪些动作可用"，
//! 并在向外部服务发起变更前完成预校验

use crate::{
    appointment_machine::{AppointmentAction, AppointmentActionKind, AppointmentStateMachine},
    case_machine::{CaseAction, CaseActionKind, CaseStateMachine},
    clock::ClockSource,
    rules::LifecycleRules,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use telemed_core::{Appointment, Case, CaseStatus, Result, ScheduleRequest, TelemedError};

/// 病例与其当前预约在某一时刻的可用动作集合
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AvailableActions {
    pub case_actions: HashSet<CaseActionKind>,
    pub appointment_actions: HashSet<AppointmentActionKind>,
}

impl AvailableActions {
    /// 是否没有任何可用动作
    pub fn is_empty(&self) -> bool {
        self.case_actions.is_empty() && self.appointment_actions.is_empty()
    }
}

/// 生命周期协调器
///
/// 输入永远是外部服务加载的病例与预约快照，输出是动作集合或校验
/// 结论，协调器本身不持有任何记录。
#[derive(Debug, Clone)]
pub struct LifecycleCoordinator {
    case_machine: CaseStateMachine,
    appointment_machine: AppointmentStateMachine,
}

impl LifecycleCoordinator {
    /// 使用默认业务规则创建协调器
    pub fn new() -> Self {
        Self::with_rules(LifecycleRules::default())
    }

    /// 使用指定业务规则创建协调器，两台状态机共享同一份规则
    pub fn with_rules(rules: LifecycleRules) -> Self {
        Self {
            case_machine: CaseStateMachine::with_rules(rules.clone()),
            appointment_machine: AppointmentStateMachine::with_rules(rules),
        }
    }

    /// 计算病例及其当前预约在指定时刻的可用动作
    pub fn compute_available_actions(
        &self,
        case: &Case,
        appointment: Option<&Appointment>,
        now: DateTime<Utc>,
    ) -> AvailableActions {
        let mut case_actions = self.case_machine.available_actions(case);

        // 只有未走到终态的预约才算当前活跃预约
        let active = appointment.filter(|appt| !appt.status.is_terminal());

        match active {
            Some(appt) => {
                // 已有活跃预约时，排期与改期入口由预约级动作提供，避免界面出现重复控件
                case_actions.remove(&CaseActionKind::Schedule);
                case_actions.remove(&CaseActionKind::Reschedule);

                // 开始会诊要等到预约时刻
                if now < appt.scheduled_time {
                    case_actions.remove(&CaseActionKind::StartConsultation);
                }
            }
            None => {
                // 没有活跃预约时无从开始会诊
                case_actions.remove(&CaseActionKind::StartConsultation);
            }
        }

        let appointment_actions = active
            .map(|appt| self.appointment_machine.eligible_actions(appt, now))
            .unwrap_or_default();

        tracing::debug!(
            "Case {} available actions at {}: {} case-level, {} appointment-level",
            case.id, now, case_actions.len(), appointment_actions.len()
        );

        AvailableActions { case_actions, appointment_actions }
    }

    /// 使用时钟源的便捷包装
    pub fn available_actions_now(
        &self,
        case: &Case,
        appointment: Option<&Appointment>,
        clock: &dyn ClockSource,
    ) -> AvailableActions {
        self.compute_available_actions(case, appointment, clock.now())
    }

    /// 预校验病例动作并返回目标状态
    ///
    /// 在病例状态机自身的守卫之外，补上需要同时看到预约快照的
    /// 跨实体守卫：开始会诊必须有活跃预约且已到预约时刻。
    pub fn validate_case_action(
        &self,
        case: &Case,
        appointment: Option<&Appointment>,
        action: &CaseAction,
        now: DateTime<Utc>,
    ) -> Result<CaseStatus> {
        let target = self.case_machine.validate(case, action)?;

        if matches!(action, CaseAction::StartConsultation) {
            let active = appointment.filter(|appt| !appt.status.is_terminal());
            match active {
                Some(appt) if now >= appt.scheduled_time => {}
                Some(_) => {
                    return Err(TelemedError::GuardFailed(
                        "consultation cannot start before the appointment time".to_string(),
                    ));
                }
                None => {
                    return Err(TelemedError::GuardFailed(
                        "case has no active appointment to start".to_string(),
                    ));
                }
            }
        }

        Ok(target)
    }

    /// 预校验预约动作并返回更新后的预约副本
    pub fn validate_appointment_action(
        &self,
        appointment: &Appointment,
        action: &AppointmentAction,
        now: DateTime<Utc>,
    ) -> Result<Appointment> {
        self.appointment_machine.validate(appointment, action, now)
    }

    /// 预校验新建预约请求并返回预约草案
    ///
    /// 病例侧要求处于可排期状态（首次排期经 `Schedule`，预约取消后再
    /// 排期经 `Reschedule`），且同一病例同时至多一个活跃预约。
    pub fn validate_schedule_request(
        &self,
        case: &Case,
        current_appointment: Option<&Appointment>,
        request: &ScheduleRequest,
        now: DateTime<Utc>,
    ) -> Result<Appointment> {
        if let Some(appt) = current_appointment.filter(|appt| !appt.status.is_terminal()) {
            return Err(TelemedError::GuardFailed(format!(
                "case already has an active appointment {}",
                appt.id
            )));
        }

        let case_action = match case.status {
            CaseStatus::Scheduled => CaseAction::Reschedule,
            _ => CaseAction::Schedule,
        };
        self.case_machine.validate(case, &case_action)?;

        self.appointment_machine.validate_schedule(request, now)
    }

    /// 获取病例状态机实例
    pub fn case_machine(&self) -> &CaseStateMachine {
        &self.case_machine
    }

    /// 获取预约状态机实例
    pub fn appointment_machine(&self) -> &AppointmentStateMachine {
        &self.appointment_machine
    }
}

impl Default for LifecycleCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
