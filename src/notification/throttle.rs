//! 通知限流 - 普通/紧急通知之间的最小间隔
//!
//! 状态只有上一次发送的时间，由分发器独占持有。page 不经过这里。

use std::time::{Duration, Instant};

/// 默认最小间隔
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(5);

/// 通知限流器
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// 两次发送之间的最小间隔
    min_interval: Duration,
    /// 上一次（尝试）发送的时间
    last_sent_at: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_sent_at: None,
        }
    }

    /// 尝试获取发送名额，成功时记录当前时间
    pub fn try_acquire(&mut self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    /// 尝试获取发送名额（带时间戳，用于测试）
    pub fn try_acquire_at(&mut self, now: Instant) -> bool {
        let allowed = match self.last_sent_at {
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
            None => true,
        };
        if allowed {
            self.last_sent_at = Some(now);
        }
        allowed
    }

}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_send_allowed() {
        let mut limiter = RateLimiter::default();
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn test_second_send_within_interval_rejected() {
        let mut limiter = RateLimiter::new(Duration::from_secs(5));
        let t0 = Instant::now();

        assert!(limiter.try_acquire_at(t0));
        assert!(!limiter.try_acquire_at(t0 + Duration::from_secs(2)));
        // 失败不刷新时间
        assert!(limiter.try_acquire_at(t0 + Duration::from_secs(5)));
    }

    #[test]
    fn test_send_at_exact_interval_allowed() {
        let mut limiter = RateLimiter::new(Duration::from_secs(5));
        let t0 = Instant::now();

        assert!(limiter.try_acquire_at(t0));
        assert!(limiter.try_acquire_at(t0 + Duration::from_secs(5)));
        assert!(!limiter.try_acquire_at(t0 + Duration::from_secs(7)));
    }

    #[test]
    fn test_interval_expires_with_real_clock() {
        let mut limiter = RateLimiter::new(Duration::from_millis(50));

        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());

        std::thread::sleep(Duration::from_millis(80));
        assert!(limiter.try_acquire());
    }

    #[test]
    fn test_zero_interval_never_limits() {
        let mut limiter = RateLimiter::new(Duration::ZERO);
        let t0 = Instant::now();
        assert!(limiter.try_acquire_at(t0));
        assert!(limiter.try_acquire_at(t0));
    }
}
