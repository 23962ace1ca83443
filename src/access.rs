/// 编译期授权 UID 白名单（精确、区分大小写匹配）。
pub const AUTHORIZED_UIDS: &[&str] = &["224c8d04", "b4067e05"];

/// UID 是否在白名单内。
pub fn is_authorized(uid: &str) -> bool {
    AUTHORIZED_UIDS.iter().any(|&entry| entry == uid)
}

/// 单个标签的读取统计。
#[derive(Clone, Debug)]
pub struct TagStats {
    pub uid: String,
    pub read_attempts: u32,
    pub successful_reads: u32,
    pub consecutive_fails: u32,
    pub last_read_ms: u64,
}

/// 有界标签历史表：限流 + 统计。
///
/// 容量写满后，新 UID 不再建档，统计被跳过，但准入判定退化为
/// “总是放行”——限流只为压制滞留读卡器的重复刷卡，不能因表压
/// 误拒陌生标签。条目只在重启时清空。
pub struct TagHistory {
    capacity: usize,
    cooldown_ms: u64,
    entries: Vec<TagStats>,
}

impl TagHistory {
    pub fn new(capacity: usize, cooldown_ms: u64) -> Self {
        Self {
            capacity,
            cooldown_ms,
            entries: Vec::with_capacity(capacity),
        }
    }

    /// 准入判定：同一 UID 在冷却窗口内的重复读取被压制。
    ///
    /// 无论放行与否都更新统计：read_attempts 单调递增，放行累加
    /// successful_reads 并清零 consecutive_fails，压制累加
    /// consecutive_fails；last_read_ms 总是打上本次时间戳。
    pub fn admit_read(&mut self, uid: &str, now_ms: u64) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.uid == uid) {
            let allow = now_ms.saturating_sub(entry.last_read_ms) >= self.cooldown_ms;
            entry.read_attempts += 1;
            if allow {
                entry.successful_reads += 1;
                entry.consecutive_fails = 0;
            } else {
                entry.consecutive_fails += 1;
            }
            entry.last_read_ms = now_ms;
            return allow;
        }

        if self.entries.len() < self.capacity {
            self.entries.push(TagStats {
                uid: uid.to_string(),
                read_attempts: 1,
                successful_reads: 1,
                consecutive_fails: 0,
                last_read_ms: now_ms,
            });
            return true;
        }

        // 表满：不建档、不统计，准入退化为放行
        true
    }

    pub fn get(&self, uid: &str) -> Option<&TagStats> {
        self.entries.iter().find(|e| e.uid == uid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 把历史表倾倒到诊断日志。
    pub fn log_stats(&self) {
        log::info!("tag history: {} tracked", self.entries.len());
        for entry in &self.entries {
            log::info!(
                "  {} attempts={} ok={} fails={} last={}ms",
                entry.uid,
                entry.read_attempts,
                entry.successful_reads,
                entry.consecutive_fails,
                entry.last_read_ms
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_is_exact_and_case_sensitive() {
        assert!(is_authorized("224c8d04"));
        assert!(is_authorized("b4067e05"));
        assert!(!is_authorized("deadbeef"));
        assert!(!is_authorized("224C8D04"));
        assert!(!is_authorized("224c8d0"));
        assert!(!is_authorized(""));
    }

    #[test]
    fn repeat_within_cooldown_is_suppressed() {
        let mut history = TagHistory::new(10, 1000);
        assert!(history.admit_read("224c8d04", 0));
        assert!(!history.admit_read("224c8d04", 500));
        assert!(history.admit_read("224c8d04", 1500));
    }

    #[test]
    fn attempts_increase_on_every_call() {
        let mut history = TagHistory::new(10, 1000);
        history.admit_read("224c8d04", 0);
        history.admit_read("224c8d04", 100);
        history.admit_read("224c8d04", 200);
        let stats = history.get("224c8d04").unwrap();
        assert_eq!(stats.read_attempts, 3);
        assert_eq!(stats.successful_reads, 1);
        assert_eq!(stats.consecutive_fails, 2);
    }

    #[test]
    fn success_resets_consecutive_fails() {
        let mut history = TagHistory::new(10, 1000);
        history.admit_read("x", 0);
        history.admit_read("x", 100); // 压制
        assert_eq!(history.get("x").unwrap().consecutive_fails, 1);
        history.admit_read("x", 2000); // 放行
        let stats = history.get("x").unwrap();
        assert_eq!(stats.consecutive_fails, 0);
        assert_eq!(stats.successful_reads, 2);
    }

    #[test]
    fn suppressed_read_still_refreshes_window() {
        let mut history = TagHistory::new(10, 1000);
        assert!(history.admit_read("x", 0));
        assert!(!history.admit_read("x", 900));
        // 窗口从最近一次读取起算
        assert!(!history.admit_read("x", 1800));
        assert!(history.admit_read("x", 2900));
    }

    #[test]
    fn full_table_never_rate_limits_untracked_tags() {
        let mut history = TagHistory::new(2, 1000);
        history.admit_read("a", 0);
        history.admit_read("b", 0);
        // 表满：陌生标签连续快速读取也总是放行，且不建档
        assert!(history.admit_read("c", 0));
        assert!(history.admit_read("c", 1));
        assert_eq!(history.len(), 2);
        assert!(history.get("c").is_none());
        // 已建档的仍受冷却约束
        assert!(!history.admit_read("a", 500));
    }
}
