//! 生命周期协调器演示程序
//!
//! 展示病例与预约生命周期的核心功能，包括可用动作计算、动作预校验、排期与加入时间窗口

use chrono::{Duration, Utc};
use telemed_core::utils::generate_case_number;
use telemed_core::{
    AppointmentStatus, Case, CaseStatus, ConsultationType, RescheduleRequest, ScheduleRequest,
    UrgencyLevel,
};
use telemed_integration::{
    AppointmentService, CaseService, InMemoryAppointmentService, InMemoryCaseService,
    InMemoryStore,
};
use telemed_lifecycle::{
    case_stats, query_cases, AppointmentAction, AppointmentActionKind, CaseAction, CaseFilter,
    ClockSource, FixedClock, LifecycleCoordinator,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    // 创建协调器与内存服务
    let coordinator = LifecycleCoordinator::new();
    let store = InMemoryStore::new();
    let case_service = InMemoryCaseService::new(store.clone());
    let appointment_service = InMemoryAppointmentService::new(store.clone());

    println!("🚀 Telemed 生命周期协调器演示\n");

    // 当前生效的业务规则
    let case_rules = coordinator.case_machine().rules();
    let appt_rules = coordinator.appointment_machine().rules();
    println!(
        "⚙️  会诊费区间 {} ~ {} 元，加入窗口为开始前 {} 分钟至开始后 {} 分钟\n",
        case_rules.fee_min,
        case_rules.fee_max,
        appt_rules.join_before_minutes,
        appt_rules.join_after_minutes
    );

    // 1. 平台把新病例分配给医生
    let doctor_id = Uuid::new_v4();
    let case = create_assigned_case(doctor_id, "持续性偏头痛两周，伴随视物模糊", UrgencyLevel::High);
    let case_id = case.id;
    store.seed_case(case.clone()).await;
    seed_extra_cases(&store, doctor_id).await;
    println!("✅ 病例 {} 已分配给医生", case.case_number);

    // 2. 查看此刻可用的病例动作
    let now = Utc::now();
    let actions = coordinator.compute_available_actions(&case, None, now);
    println!("📋 可用病例动作: {:?}", actions.case_actions);

    // 3. 医生接诊
    coordinator.validate_case_action(&case, None, &CaseAction::Accept, now)?;
    let case = case_service.accept_case(case_id).await?;
    println!("✅ 病例已接诊: {:?}", case.status);

    // 4. 设置会诊费用，超出区间会被拦截
    if let Err(e) =
        coordinator.validate_case_action(&case, None, &CaseAction::SetFee { fee: 60.0 }, now)
    {
        // 校验类错误交给表单提示，而不是系统告警
        if e.is_validation_failure() {
            println!("⛔ 费用 60 被拒绝: {}", e);
        } else {
            return Err(e.into());
        }
    }
    coordinator.validate_case_action(&case, None, &CaseAction::SetFee { fee: 150.0 }, now)?;
    let case = case_service.set_case_fee(case_id, 150.0).await?;
    println!("✅ 会诊费用已设置: {:?}", case.consultation_fee);

    // 5. 排期视频会诊
    let request = ScheduleRequest {
        case_id,
        patient_id: case.patient_id,
        doctor_id,
        scheduled_time: now + Duration::hours(24),
        duration_minutes: 30,
        consultation_type: ConsultationType::VideoConsultation,
        meeting_link: Some("https://meet.telemed.example.com/room/301".to_string()),
    };
    coordinator.validate_schedule_request(&case, None, &request, now)?;
    let appointment = appointment_service.schedule_appointment(&request).await?;
    let case = case_service.get_case(case_id).await?;
    println!(
        "✅ 预约已排期: {} ~ {}，病例状态: {:?}",
        appointment.scheduled_time,
        appointment.end_time(),
        case.status
    );

    // 6. 医生改期，改期后的时段要等患者重新确认
    let reschedule = RescheduleRequest {
        new_time: now + Duration::hours(48),
        reason: "医生临时有紧急手术需要处理".to_string(),
        new_duration: None,
    };
    coordinator.validate_appointment_action(
        &appointment,
        &AppointmentAction::Reschedule(reschedule.clone()),
        now,
    )?;
    let appointment = appointment_service
        .reschedule_appointment(appointment.id, &reschedule)
        .await?;
    println!(
        "🔄 预约已改期至 {} (第 {} 次改期)",
        appointment.scheduled_time, appointment.reschedule_count
    );

    let mut clock = FixedClock::new(appointment.scheduled_time - Duration::minutes(10));
    let actions = coordinator.available_actions_now(&case, Some(&appointment), &clock);
    println!(
        "🕐 新时段开始前10分钟，患者尚未确认，加入入口开放: {}",
        actions.appointment_actions.contains(&AppointmentActionKind::Join)
    );

    // 7. 患者确认新时段（由患者端写入）
    let mut appointment = appointment;
    appointment.status = AppointmentStatus::Confirmed;
    store.seed_appointment(appointment.clone()).await;
    println!("✅ 患者已确认新时段");

    // 8. 加入时间窗口：提前15分钟开放
    clock.set(appointment.scheduled_time - Duration::hours(2));
    let actions = coordinator.available_actions_now(&case, Some(&appointment), &clock);
    println!(
        "🕐 开始前2小时，加入入口开放: {}",
        actions.appointment_actions.contains(&AppointmentActionKind::Join)
    );

    clock.set(appointment.scheduled_time - Duration::minutes(10));
    let actions = coordinator.available_actions_now(&case, Some(&appointment), &clock);
    println!(
        "🕐 开始前10分钟，加入入口开放: {}",
        actions.appointment_actions.contains(&AppointmentActionKind::Join)
    );

    coordinator.validate_appointment_action(&appointment, &AppointmentAction::Join, clock.now())?;
    let appointment = appointment_service.record_join(appointment.id).await?;
    println!("✅ 医生已进入会诊室: {:?}", appointment.joined_at);

    // 9. 到预约时刻后开始会诊
    clock.set(appointment.scheduled_time + Duration::minutes(1));
    coordinator.validate_case_action(
        &case,
        Some(&appointment),
        &CaseAction::StartConsultation,
        clock.now(),
    )?;
    let case = case_service.start_consultation(case_id).await?;
    println!("🩺 会诊进行中: {:?}", case.status);

    // 10. 结束会诊
    coordinator.validate_appointment_action(
        &appointment,
        &AppointmentAction::Complete,
        clock.now(),
    )?;
    appointment_service.complete_appointment(appointment.id).await?;
    coordinator.validate_case_action(&case, None, &CaseAction::CompleteConsultation, clock.now())?;
    let case = case_service.complete_consultation(case_id).await?;
    println!("✅ 会诊已结束: {:?}", case.status);

    // 11. 关闭病例需要报告先定稿
    if let Err(e) = coordinator.validate_case_action(&case, None, &CaseAction::Close, clock.now()) {
        println!("⛔ 报告未定稿，无法关闭: {}", e);
    }
    let case = case_service.finalize_report(case_id).await?;
    coordinator.validate_case_action(&case, None, &CaseAction::Close, clock.now())?;
    let case = case_service.close_case(case_id).await?;
    println!("✅ 病例已关闭: {:?}", case.status);

    // 12. 医生工作列表统计
    let all_cases = case_service.list_doctor_cases(doctor_id).await?;
    let stats = case_stats(&all_cases);
    println!("\n📊 医生工作列表:");
    println!("   病例总数: {}", stats.total);
    println!("   未结病例: {}", stats.open_cases);
    println!("   待定价病例: {}", stats.awaiting_fee);

    let filter = CaseFilter {
        doctor_id: Some(doctor_id),
        ..Default::default()
    };
    for case in query_cases(&all_cases, &filter) {
        println!(
            "   - {} [{:?}] {:?}",
            case.case_number, case.urgency_level, case.status
        );
    }

    println!("\n🎉 生命周期演示完成!");
    Ok(())
}

/// 创建已分配状态的示例病例
fn create_assigned_case(doctor_id: Uuid, description: &str, urgency: UrgencyLevel) -> Case {
    let now = Utc::now();
    Case {
        id: Uuid::new_v4(),
        case_number: generate_case_number(),
        patient_id: Uuid::new_v4(),
        doctor_id: Some(doctor_id),
        status: CaseStatus::Assigned,
        description: Some(description.to_string()),
        consultation_fee: None,
        urgency_level: urgency,
        report_finalized: false,
        assigned_at: Some(now),
        accepted_at: None,
        closed_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// 预置几个病例让工作列表统计更有内容
async fn seed_extra_cases(store: &InMemoryStore, doctor_id: Uuid) {
    let mut accepted =
        create_assigned_case(doctor_id, "慢性下背痛三个月，保守治疗效果不佳", UrgencyLevel::Medium);
    accepted.status = CaseStatus::Accepted;
    accepted.accepted_at = Some(Utc::now());
    store.seed_case(accepted).await;

    let critical = create_assigned_case(doctor_id, "急性胸痛伴呼吸困难", UrgencyLevel::Critical);
    store.seed_case(critical).await;
}
