use std::time::Duration;

/// 核心配置 - 所有配置项都可以通过环境变量覆盖
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/commerce | 工作目录 (账本数据库所在) |
/// | ISSUANCE_STRATEGY | pessimistic | 发放策略: pessimistic \| fast-cache |
/// | LOCK_WAIT_MS | 5000 | 锁等待上限(毫秒), 超时返回可重试错误 |
/// | ENVIRONMENT | development | 运行环境 |
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储账本数据库文件
    pub work_dir: String,
    /// 优惠券发放策略
    pub issuance_strategy: IssuanceStrategyKind,
    /// 锁等待上限 (毫秒)
    pub lock_wait_ms: u64,
    /// 运行环境: development | staging | production
    pub environment: String,
}

/// Issuance strategy selection — a configuration option, not a code fork
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuanceStrategyKind {
    /// Exclusive per-coupon lock around the store read-modify-write
    Pessimistic,
    /// Atomic set + remaining-count cell in front of the store
    FastCache,
}

impl IssuanceStrategyKind {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "pessimistic" => Some(Self::Pessimistic),
            "fast-cache" | "fast_cache" => Some(Self::FastCache),
            _ => None,
        }
    }
}

impl Config {
    /// 从环境变量加载配置，未设置的使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/commerce".into()),
            issuance_strategy: std::env::var("ISSUANCE_STRATEGY")
                .ok()
                .and_then(|v| IssuanceStrategyKind::parse(&v))
                .unwrap_or(IssuanceStrategyKind::Pessimistic),
            lock_wait_ms: std::env::var("LOCK_WAIT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }

    /// 使用自定义策略构造配置，常用于测试场景
    pub fn with_strategy(strategy: IssuanceStrategyKind) -> Self {
        let mut config = Self::from_env();
        config.issuance_strategy = strategy;
        config
    }

    /// Bound for lock / atomic-primitive waits
    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parse() {
        assert_eq!(
            IssuanceStrategyKind::parse("pessimistic"),
            Some(IssuanceStrategyKind::Pessimistic)
        );
        assert_eq!(
            IssuanceStrategyKind::parse("fast-cache"),
            Some(IssuanceStrategyKind::FastCache)
        );
        assert_eq!(
            IssuanceStrategyKind::parse("fast_cache"),
            Some(IssuanceStrategyKind::FastCache)
        );
        assert_eq!(IssuanceStrategyKind::parse("optimistic"), None);
    }
}
