//! 病例状态机
//!
//! 管理会诊病例从分配到结案的完整生命周期状态转换

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use telemed_core::{Case, CaseStatus, Result, TelemedError};

use crate::rules::LifecycleRules;

/// 病例动作（带业务参数）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum CaseAction {
    /// 接诊
    Accept,
    /// 拒诊，必须给出理由
    Reject { reason: String },
    /// 设置会诊费，状态保持已接诊
    SetFee { fee: f64 },
    /// 排期，费用设置后才可用
    Schedule,
    /// 改期，具体校验委托给预约状态机
    Reschedule,
    /// 开始会诊
    StartConsultation,
    /// 完成会诊
    CompleteConsultation,
    /// 结案
    Close,
}

impl CaseAction {
    /// 返回动作种类
    pub fn kind(&self) -> CaseActionKind {
        match self {
            CaseAction::Accept => CaseActionKind::Accept,
            CaseAction::Reject { .. } => CaseActionKind::Reject,
            CaseAction::SetFee { .. } => CaseActionKind::SetFee,
            CaseAction::Schedule => CaseActionKind::Schedule,
            CaseAction::Reschedule => CaseActionKind::Reschedule,
            CaseAction::StartConsultation => CaseActionKind::StartConsultation,
            CaseAction::CompleteConsultation => CaseActionKind::CompleteConsultation,
            CaseAction::Close => CaseActionKind::Close,
        }
    }
}

/// 病例动作种类（无参数，用于可用动作集合）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CaseActionKind {
    Accept,
    Reject,
    SetFee,
    Schedule,
    Reschedule,
    StartConsultation,
    CompleteConsultation,
    Close,
}

/// 病例状态机
#[derive(Debug, Clone)]
pub struct CaseStateMachine {
    rules: LifecycleRules,
    transitions: HashMap<(CaseStatus, CaseActionKind), CaseStatus>,
}

impl CaseStateMachine {
    /// 使用默认业务规则创建状态机
    pub fn new() -> Self {
        Self::with_rules(LifecycleRules::default())
    }

    /// 使用指定业务规则创建状态机
    pub fn with_rules(rules: LifecycleRules) -> Self {
        let mut transitions = HashMap::new();

        // 正向推进
        transitions.insert((CaseStatus::Assigned, CaseActionKind::Accept), CaseStatus::Accepted);
        transitions.insert((CaseStatus::Accepted, CaseActionKind::SetFee), CaseStatus::Accepted);
        transitions.insert((CaseStatus::Accepted, CaseActionKind::Schedule), CaseStatus::Scheduled);
        transitions.insert((CaseStatus::Scheduled, CaseActionKind::Reschedule), CaseStatus::Scheduled);
        transitions.insert((CaseStatus::Scheduled, CaseActionKind::StartConsultation), CaseStatus::InProgress);
        transitions.insert((CaseStatus::InProgress, CaseActionKind::CompleteConsultation), CaseStatus::ConsultationComplete);
        transitions.insert((CaseStatus::ConsultationComplete, CaseActionKind::Close), CaseStatus::Closed);

        // 显式中止，仅限接诊前后
        transitions.insert((CaseStatus::Assigned, CaseActionKind::Reject), CaseStatus::Rejected);
        transitions.insert((CaseStatus::Accepted, CaseActionKind::Reject), CaseStatus::Rejected);

        Self { rules, transitions }
    }

    /// 当前生效的业务规则
    pub fn rules(&self) -> &LifecycleRules {
        &self.rules
    }

    /// 计算病例快照当前可执行的动作种类
    ///
    /// 结果只包含状态允许且快照级守卫成立的动作；依赖动作参数的守卫
    /// （理由长度、费用区间）在 [`validate`](Self::validate) 中检查。
    pub fn available_actions(&self, case: &Case) -> HashSet<CaseActionKind> {
        self.transitions
            .keys()
            .filter(|(status, _)| *status == case.status)
            .map(|(_, kind)| *kind)
            .filter(|kind| self.snapshot_guard_holds(case, *kind))
            .collect()
    }

    /// 动作在当前快照下是否可用
    pub fn can_apply(&self, case: &Case, kind: CaseActionKind) -> bool {
        self.available_actions(case).contains(&kind)
    }

    /// 校验动作并返回目标状态，不修改输入快照
    pub fn validate(&self, case: &Case, action: &CaseAction) -> Result<CaseStatus> {
        let kind = action.kind();
        let target = match self.transitions.get(&(case.status, kind)) {
            Some(target) => *target,
            None => {
                tracing::warn!(
                    "Case {} in status {:?} cannot apply action {:?}",
                    case.id, case.status, kind
                );
                return Err(TelemedError::InvalidState {
                    status: format!("{:?}", case.status),
                    action: format!("{:?}", kind),
                });
            }
        };

        self.check_guards(case, action)?;

        tracing::debug!(
            "Case {} action {:?} validated: {:?} -> {:?}",
            case.id, kind, case.status, target
        );
        Ok(target)
    }

    /// 快照级守卫，不依赖动作参数
    fn snapshot_guard_holds(&self, case: &Case, kind: CaseActionKind) -> bool {
        match kind {
            CaseActionKind::Schedule => case.fee_is_set(),
            CaseActionKind::Close => case.report_finalized,
            _ => true,
        }
    }

    /// 完整守卫检查，含参数级守卫
    fn check_guards(&self, case: &Case, action: &CaseAction) -> Result<()> {
        match action {
            CaseAction::Reject { reason } => {
                if !self.rules.reason_acceptable(reason) {
                    return Err(TelemedError::GuardFailed(format!(
                        "rejection reason must be at least {} characters",
                        self.rules.min_reason_chars
                    )));
                }
            }
            CaseAction::SetFee { fee } => {
                if !self.rules.fee_in_bounds(*fee) {
                    return Err(TelemedError::GuardFailed(format!(
                        "consultation fee must be within [{}, {}], got {}",
                        self.rules.fee_min, self.rules.fee_max, fee
                    )));
                }
            }
            CaseAction::Schedule => {
                if !case.fee_is_set() {
                    return Err(TelemedError::GuardFailed(
                        "consultation fee must be set before scheduling".to_string(),
                    ));
                }
            }
            CaseAction::Close => {
                if !case.report_finalized {
                    return Err(TelemedError::GuardFailed(
                        "consultation report must be finalized before closing".to_string(),
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl Default for CaseStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_case(status: CaseStatus) -> Case {
        let now = Utc::now();
        Case {
            id: Uuid::new_v4(),
            case_number: "TMC-20240603-1a2b3c4d".to_string(),
            patient_id: Uuid::new_v4(),
            doctor_id: Some(Uuid::new_v4()),
            status,
            description: Some("持续性头痛两周".to_string()),
            consultation_fee: None,
            urgency_level: telemed_core::UrgencyLevel::Medium,
            report_finalized: false,
            assigned_at: Some(now),
            accepted_at: None,
            closed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_accept_and_reject_from_assigned() {
        let sm = CaseStateMachine::new();
        let case = sample_case(CaseStatus::Assigned);

        let actions = sm.available_actions(&case);
        assert!(actions.contains(&CaseActionKind::Accept));
        assert!(actions.contains(&CaseActionKind::Reject));
        assert_eq!(actions.len(), 2);

        assert_eq!(sm.validate(&case, &CaseAction::Accept).unwrap(), CaseStatus::Accepted);
    }

    #[test]
    fn test_schedule_requires_fee() {
        let sm = CaseStateMachine::new();
        let mut case = sample_case(CaseStatus::Accepted);

        // 未设置费用时排期不可用
        assert!(!sm.available_actions(&case).contains(&CaseActionKind::Schedule));
        let err = sm.validate(&case, &CaseAction::Schedule).unwrap_err();
        assert!(matches!(err, TelemedError::GuardFailed(_)));

        // 费用为零仍视为未设置
        case.consultation_fee = Some(0.0);
        assert!(!sm.available_actions(&case).contains(&CaseActionKind::Schedule));

        case.consultation_fee = Some(150.0);
        assert!(sm.available_actions(&case).contains(&CaseActionKind::Schedule));
        assert_eq!(sm.validate(&case, &CaseAction::Schedule).unwrap(), CaseStatus::Scheduled);
    }

    #[test]
    fn test_set_fee_bounds() {
        let sm = CaseStateMachine::new();
        let case = sample_case(CaseStatus::Accepted);

        // 边界值含端点
        assert_eq!(sm.validate(&case, &CaseAction::SetFee { fee: 100.0 }).unwrap(), CaseStatus::Accepted);
        assert_eq!(sm.validate(&case, &CaseAction::SetFee { fee: 500.0 }).unwrap(), CaseStatus::Accepted);

        let err = sm.validate(&case, &CaseAction::SetFee { fee: 99.99 }).unwrap_err();
        assert!(matches!(err, TelemedError::GuardFailed(_)));
        let err = sm.validate(&case, &CaseAction::SetFee { fee: 500.01 }).unwrap_err();
        assert!(matches!(err, TelemedError::GuardFailed(_)));
    }

    #[test]
    fn test_reject_reason_length() {
        let sm = CaseStateMachine::new();

        for status in [CaseStatus::Assigned, CaseStatus::Accepted] {
            let case = sample_case(status);

            let err = sm
                .validate(&case, &CaseAction::Reject { reason: "too busy".to_string() })
                .unwrap_err();
            assert!(matches!(err, TelemedError::GuardFailed(_)));

            let target = sm
                .validate(
                    &case,
                    &CaseAction::Reject {
                        reason: "unable to take this case at this time".to_string(),
                    },
                )
                .unwrap();
            assert_eq!(target, CaseStatus::Rejected);
        }
    }

    #[test]
    fn test_no_skipping_forward() {
        let sm = CaseStateMachine::new();

        let case = sample_case(CaseStatus::Accepted);
        let err = sm.validate(&case, &CaseAction::StartConsultation).unwrap_err();
        assert!(matches!(err, TelemedError::InvalidState { .. }));

        let case = sample_case(CaseStatus::Assigned);
        let err = sm.validate(&case, &CaseAction::Close).unwrap_err();
        assert!(matches!(err, TelemedError::InvalidState { .. }));
    }

    #[test]
    fn test_terminal_states_locked() {
        let sm = CaseStateMachine::new();

        for status in [CaseStatus::Closed, CaseStatus::Rejected] {
            let case = sample_case(status);
            assert!(sm.available_actions(&case).is_empty());

            let err = sm.validate(&case, &CaseAction::Accept).unwrap_err();
            assert!(matches!(err, TelemedError::InvalidState { .. }));
        }
    }

    #[test]
    fn test_payment_pending_has_no_doctor_actions() {
        let sm = CaseStateMachine::new();
        let case = sample_case(CaseStatus::PaymentPending);

        // 等待支付由外部支付流程推进，医生端没有任何可用动作
        assert!(sm.available_actions(&case).is_empty());
    }

    #[test]
    fn test_close_requires_finalized_report() {
        let sm = CaseStateMachine::new();
        let mut case = sample_case(CaseStatus::ConsultationComplete);

        assert!(!sm.available_actions(&case).contains(&CaseActionKind::Close));
        let err = sm.validate(&case, &CaseAction::Close).unwrap_err();
        assert!(matches!(err, TelemedError::GuardFailed(_)));

        case.report_finalized = true;
        assert!(sm.can_apply(&case, CaseActionKind::Close));
        assert_eq!(sm.validate(&case, &CaseAction::Close).unwrap(), CaseStatus::Closed);
    }

    #[test]
    fn test_validate_does_not_mutate_snapshot() {
        let sm = CaseStateMachine::new();
        let mut case = sample_case(CaseStatus::Assigned);
        case.consultation_fee = Some(200.0);
        let before = case.clone();

        let _ = sm.validate(&case, &CaseAction::Accept);
        assert_eq!(case.status, before.status);
        assert_eq!(case.consultation_fee, before.consultation_fee);
    }
}
