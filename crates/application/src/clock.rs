use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use domain::{normalize_timestamp, Timestamp};

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// 系统时钟，输出已截断到存储精度
///
/// 同一实例发出的时间严格递增：墙钟重复或回拨时在上一次的基础上加一微秒。
#[derive(Debug, Default)]
pub struct SystemClock {
    last_micros: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_after(&self, wall_micros: i64) -> i64 {
        let mut last = self.last_micros.load(Ordering::Relaxed);
        loop {
            let next = wall_micros.max(last.saturating_add(1));
            match self.last_micros.compare_exchange_weak(
                last,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(current) => last = current,
            }
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let wall = normalize_timestamp(Utc::now());
        let micros = self.next_after(wall.timestamp_micros());
        DateTime::from_timestamp_micros(micros).unwrap_or(wall)
    }
}
