//! 时间源抽象
//!
//! 把"当前时刻"从业务规则中剥离出来，时间窗口判断全部以显式传入的
//! 时刻为准，测试中可以使用固定时钟得到确定性结果

use chrono::{DateTime, Duration, Utc};

/// 时间源接口
pub trait ClockSource: Send + Sync {
    /// 返回当前时刻
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 固定时钟（测试与演示用）
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    instant: DateTime<Utc>,
}

impl FixedClock {
    /// 创建固定在指定时刻的时钟
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self { instant }
    }

    /// 把时钟拨快指定时长
    pub fn advance(&mut self, duration: Duration) {
        self.instant += duration;
    }

    /// 重设时钟时刻
    pub fn set(&mut self, instant: DateTime<Utc>) {
        self.instant = instant;
    }
}

impl ClockSource for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.instant
    }
}
