//! 病例工作列表
//!
//! 为医生端列表页提供过滤、排序与统计。病例快照由外部服务加载，
//! 这里只做纯函数计算，不持有任何记录。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use telemed_core::{Appointment, Case, CaseStatus, UrgencyLevel};
use uuid::Uuid;

/// 病例列表过滤器
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseFilter {
    pub doctor_id: Option<Uuid>,
    pub statuses: Option<Vec<CaseStatus>>,
    pub urgency: Option<Vec<UrgencyLevel>>,
    pub assigned_from: Option<DateTime<Utc>>,
    pub assigned_to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Default for CaseFilter {
    fn default() -> Self {
        Self {
            doctor_id: None,
            statuses: None,
            urgency: None,
            assigned_from: None,
            assigned_to: None,
            limit: Some(50),
            offset: Some(0),
        }
    }
}

/// 病例列表统计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseListStats {
    pub total: usize,
    pub open_cases: usize,   // 未到终态的病例
    pub awaiting_fee: usize, // 已接诊但尚未设置费用
    pub by_status: HashMap<CaseStatus, usize>,
    pub by_urgency: HashMap<UrgencyLevel, usize>,
}

/// 查询病例列表
///
/// 过滤后按紧急程度降序排列，同级按分配时间先到先处理，再做分页。
pub fn query_cases(cases: &[Case], filter: &CaseFilter) -> Vec<Case> {
    let mut selected: Vec<&Case> = cases.iter().collect();

    // 应用过滤器
    if let Some(doctor_id) = filter.doctor_id {
        selected.retain(|case| case.doctor_id == Some(doctor_id));
    }

    if let Some(statuses) = &filter.statuses {
        selected.retain(|case| statuses.contains(&case.status));
    }

    if let Some(urgency) = &filter.urgency {
        selected.retain(|case| urgency.contains(&case.urgency_level));
    }

    if let Some(from) = filter.assigned_from {
        selected.retain(|case| case.assigned_at.map(|at| at >= from).unwrap_or(false));
    }

    if let Some(to) = filter.assigned_to {
        selected.retain(|case| case.assigned_at.map(|at| at <= to).unwrap_or(false));
    }

    // 紧急优先，同级先分配先处理
    selected.sort_by(|a, b| match b.urgency_level.cmp(&a.urgency_level) {
        std::cmp::Ordering::Equal => a.assigned_at.cmp(&b.assigned_at),
        other => other,
    });

    // 应用分页
    let offset = filter.offset.unwrap_or(0);
    let limit = filter.limit.unwrap_or(50);

    let total = selected.len();
    let start = offset.min(total);
    let end = start.saturating_add(limit).min(total);

    selected[start..end].iter().map(|case| (*case).clone()).collect()
}

/// 统计病例列表
pub fn case_stats(cases: &[Case]) -> CaseListStats {
    let mut stats = CaseListStats {
        total: cases.len(),
        open_cases: 0,
        awaiting_fee: 0,
        by_status: HashMap::new(),
        by_urgency: HashMap::new(),
    };

    for case in cases {
        if !case.status.is_terminal() {
            stats.open_cases += 1;
        }
        if case.status == CaseStatus::Accepted && !case.fee_is_set() {
            stats.awaiting_fee += 1;
        }

        *stats.by_status.entry(case.status).or_insert(0) += 1;
        *stats.by_urgency.entry(case.urgency_level).or_insert(0) += 1;
    }

    stats
}

/// 筛选时间范围内即将开始的预约，按开始时间升序
pub fn upcoming_appointments(
    appointments: &[Appointment],
    now: DateTime<Utc>,
    horizon: Duration,
) -> Vec<Appointment> {
    let mut upcoming: Vec<&Appointment> = appointments
        .iter()
        .filter(|appt| !appt.status.is_terminal())
        .filter(|appt| appt.scheduled_time >= now && appt.scheduled_time <= now + horizon)
        .collect();

    upcoming.sort_by_key(|appt| appt.scheduled_time);
    upcoming.iter().map(|appt| (*appt).clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use telemed_core::{AppointmentStatus, ConsultationType};

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap()
    }

    fn sample_case(
        doctor_id: Uuid,
        status: CaseStatus,
        urgency: UrgencyLevel,
        assigned_offset_hours: i64,
    ) -> Case {
        let assigned = base_time() + Duration::hours(assigned_offset_hours);
        Case {
            id: Uuid::new_v4(),
            case_number: "TMC-20240603-00abcdef".to_string(),
            patient_id: Uuid::new_v4(),
            doctor_id: Some(doctor_id),
            status,
            description: None,
            consultation_fee: None,
            urgency_level: urgency,
            report_finalized: false,
            assigned_at: Some(assigned),
            accepted_at: None,
            closed_at: None,
            created_at: assigned,
            updated_at: assigned,
        }
    }

    fn sample_appointment(status: AppointmentStatus, start_offset_hours: i64) -> Appointment {
        let created = base_time() - Duration::days(1);
        Appointment {
            id: Uuid::new_v4(),
            case_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            status,
            scheduled_time: base_time() + Duration::hours(start_offset_hours),
            duration_minutes: 30,
            consultation_type: ConsultationType::VideoConsultation,
            reschedule_count: 0,
            meeting_link: None,
            joined_at: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_query_sorts_by_urgency_then_assignment_time() {
        let doctor = Uuid::new_v4();
        let cases = vec![
            sample_case(doctor, CaseStatus::Assigned, UrgencyLevel::Low, 0),
            sample_case(doctor, CaseStatus::Assigned, UrgencyLevel::Critical, 5),
            sample_case(doctor, CaseStatus::Assigned, UrgencyLevel::High, 2),
            sample_case(doctor, CaseStatus::Assigned, UrgencyLevel::Critical, 1),
        ];

        let result = query_cases(&cases, &CaseFilter::default());
        assert_eq!(result.len(), 4);
        assert_eq!(result[0].urgency_level, UrgencyLevel::Critical);
        assert_eq!(result[1].urgency_level, UrgencyLevel::Critical);
        // 同为危急，先分配的排在前面
        assert!(result[0].assigned_at < result[1].assigned_at);
        assert_eq!(result[2].urgency_level, UrgencyLevel::High);
        assert_eq!(result[3].urgency_level, UrgencyLevel::Low);
    }

    #[test]
    fn test_query_filters() {
        let doctor_a = Uuid::new_v4();
        let doctor_b = Uuid::new_v4();
        let cases = vec![
            sample_case(doctor_a, CaseStatus::Assigned, UrgencyLevel::Medium, 0),
            sample_case(doctor_a, CaseStatus::Accepted, UrgencyLevel::High, 1),
            sample_case(doctor_b, CaseStatus::Assigned, UrgencyLevel::High, 2),
        ];

        let filter = CaseFilter {
            doctor_id: Some(doctor_a),
            ..Default::default()
        };
        assert_eq!(query_cases(&cases, &filter).len(), 2);

        let filter = CaseFilter {
            statuses: Some(vec![CaseStatus::Accepted]),
            ..Default::default()
        };
        let result = query_cases(&cases, &filter);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].status, CaseStatus::Accepted);

        let filter = CaseFilter {
            urgency: Some(vec![UrgencyLevel::High]),
            assigned_from: Some(base_time() + Duration::hours(2)),
            ..Default::default()
        };
        assert_eq!(query_cases(&cases, &filter).len(), 1);
    }

    #[test]
    fn test_query_pagination() {
        let doctor = Uuid::new_v4();
        let cases: Vec<Case> = (0..7)
            .map(|i| sample_case(doctor, CaseStatus::Assigned, UrgencyLevel::Medium, i))
            .collect();

        let filter = CaseFilter {
            limit: Some(3),
            offset: Some(5),
            ..Default::default()
        };
        assert_eq!(query_cases(&cases, &filter).len(), 2);

        // 超出范围的偏移返回空列表而不是越界
        let filter = CaseFilter {
            offset: Some(100),
            ..Default::default()
        };
        assert!(query_cases(&cases, &filter).is_empty());
    }

    #[test]
    fn test_query_unbounded_limit_with_offset() {
        let doctor = Uuid::new_v4();
        let cases: Vec<Case> = (0..2)
            .map(|i| sample_case(doctor, CaseStatus::Assigned, UrgencyLevel::Medium, i))
            .collect();

        // usize::MAX 表示不限数量，与偏移组合时不能溢出
        let filter = CaseFilter {
            limit: Some(usize::MAX),
            offset: Some(1),
            ..Default::default()
        };
        assert_eq!(query_cases(&cases, &filter).len(), 1);

        let filter = CaseFilter {
            limit: Some(usize::MAX),
            offset: Some(0),
            ..Default::default()
        };
        assert_eq!(query_cases(&cases, &filter).len(), 2);
    }

    #[test]
    fn test_case_stats() {
        let doctor = Uuid::new_v4();
        let mut accepted = sample_case(doctor, CaseStatus::Accepted, UrgencyLevel::High, 0);
        accepted.consultation_fee = Some(150.0);
        let cases = vec![
            sample_case(doctor, CaseStatus::Assigned, UrgencyLevel::Low, 0),
            accepted,
            sample_case(doctor, CaseStatus::Accepted, UrgencyLevel::High, 1),
            sample_case(doctor, CaseStatus::Closed, UrgencyLevel::Medium, 2),
        ];

        let stats = case_stats(&cases);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.open_cases, 3);
        assert_eq!(stats.awaiting_fee, 1);
        assert_eq!(stats.by_status[&CaseStatus::Accepted], 2);
        assert_eq!(stats.by_urgency[&UrgencyLevel::High], 2);
    }

    #[test]
    fn test_upcoming_appointments() {
        let appointments = vec![
            sample_appointment(AppointmentStatus::Scheduled, 30),
            sample_appointment(AppointmentStatus::Confirmed, 2),
            sample_appointment(AppointmentStatus::Cancelled, 4), // 终态不计入
            sample_appointment(AppointmentStatus::Scheduled, -1), // 已过开始时间
            sample_appointment(AppointmentStatus::Scheduled, 10),
        ];

        let result = upcoming_appointments(&appointments, base_time(), Duration::hours(24));
        assert_eq!(result.len(), 2);
        // 按开始时间升序
        assert!(result[0].scheduled_time < result[1].scheduled_time);
    }
}
