//! 业务规则配置
//!
//! 费用区间、理由长度与各时间窗口在源流程中是写死的数值，这里作为
//! 可配置项提供，默认值即平台当前的取值

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use telemed_core::{Result, TelemedError};

/// 生命周期业务规则
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LifecycleRules {
    /// 会诊费下限（含）
    pub fee_min: f64,
    /// 会诊费上限（含）
    pub fee_max: f64,
    /// 拒诊、改期、取消理由的最少字符数
    pub min_reason_chars: usize,
    /// 加入窗口：预约开始前多少分钟开放
    pub join_before_minutes: i64,
    /// 加入窗口：预约开始后多少分钟关闭
    pub join_after_minutes: i64,
    /// 爽约宽限期（分钟）
    pub no_show_grace_minutes: i64,
    /// 允许的会诊时长（分钟）
    pub allowed_durations: Vec<u32>,
}

impl Default for LifecycleRules {
    fn default() -> Self {
        Self {
            fee_min: 100.0,
            fee_max: 500.0,
            min_reason_chars: 10,
            join_before_minutes: 15,
            join_after_minutes: 30,
            no_show_grace_minutes: 30,
            allowed_durations: vec![15, 30, 45, 60, 90, 120],
        }
    }
}

impl LifecycleRules {
    /// 从配置文件和环境变量加载规则
    ///
    /// 配置文件可以不存在，未给出的字段使用默认值；环境变量前缀为
    /// `TELEMED`，例如 `TELEMED_FEE_MAX=800` 覆盖费用上限。
    pub fn load(config_path: &str) -> Result<Self> {
        let defaults = Self::default();

        let settings = Config::builder()
            .add_source(
                Config::try_from(&defaults).map_err(|e| TelemedError::Config(e.to_string()))?,
            )
            .add_source(File::with_name(config_path).required(false))
            .add_source(Environment::with_prefix("TELEMED"))
            .build()
            .map_err(|e| TelemedError::Config(e.to_string()))?;

        let rules: Self = settings
            .try_deserialize()
            .map_err(|e| TelemedError::Config(e.to_string()))?;

        rules.ensure_valid()?;

        tracing::info!("Lifecycle rules loaded from: {}", config_path);
        Ok(rules)
    }

    /// 校验规则自身的一致性
    pub fn ensure_valid(&self) -> Result<()> {
        if self.fee_min < 0.0 || self.fee_max < self.fee_min {
            return Err(TelemedError::Config(format!(
                "invalid fee bounds: [{}, {}]",
                self.fee_min, self.fee_max
            )));
        }
        if self.allowed_durations.is_empty() {
            return Err(TelemedError::Config(
                "allowed_durations cannot be empty".to_string(),
            ));
        }
        if self.join_before_minutes < 0 || self.join_after_minutes < 0 || self.no_show_grace_minutes < 0 {
            return Err(TelemedError::Config(
                "time windows cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// 费用是否落在允许区间内（含边界）
    pub fn fee_in_bounds(&self, fee: f64) -> bool {
        fee >= self.fee_min && fee <= self.fee_max
    }

    /// 理由是否达到最少长度（按字符计，不按字节计）
    pub fn reason_acceptable(&self, reason: &str) -> bool {
        reason.chars().count() >= self.min_reason_chars
    }

    /// 会诊时长是否在允许集合内
    pub fn duration_allowed(&self, minutes: u32) -> bool {
        self.allowed_durations.contains(&minutes)
    }
}
