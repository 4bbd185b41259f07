//! 短期记忆：只追加、可选有界的记录日志
//!
//! 满容量时先淘汰最旧记录（FIFO）再追加；检索为大小写不敏感的子串过滤，结果保持时间顺序。

use std::collections::VecDeque;
use std::sync::RwLock;

use crate::memory::MemoryRecord;

/// 记忆能力：add / retrieve / clear / len
pub trait MemoryStore: Send + Sync {
    fn add(&self, record: MemoryRecord);

    /// query 为空（None 或空串）时返回最近 top_k 条；否则返回内容包含 query 的最近 top_k 条。
    /// 两种情况都按时间正序排列。
    fn retrieve(&self, query: Option<&str>, top_k: usize) -> Vec<MemoryRecord>;

    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 滚动缓冲区实现；capacity 为 None 时不设上限
#[derive(Debug, Default)]
pub struct ShortTermMemory {
    buffer: RwLock<VecDeque<MemoryRecord>>,
    capacity: Option<usize>,
}

impl ShortTermMemory {
    pub fn bounded(capacity: usize) -> Self {
        Self {
            buffer: RwLock::new(VecDeque::with_capacity(capacity.max(1))),
            capacity: Some(capacity.max(1)),
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, VecDeque<MemoryRecord>> {
        self.buffer.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, VecDeque<MemoryRecord>> {
        self.buffer.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// 取迭代结果的最后 k 个，保持原顺序
fn last_k<I>(iter: I, k: usize) -> Vec<MemoryRecord>
where
    I: DoubleEndedIterator<Item = MemoryRecord>,
{
    let mut out: Vec<MemoryRecord> = iter.rev().take(k).collect();
    out.reverse();
    out
}

impl MemoryStore for ShortTermMemory {
    fn add(&self, record: MemoryRecord) {
        let mut buf = self.write();
        if let Some(cap) = self.capacity {
            while buf.len() >= cap {
                buf.pop_front();
            }
        }
        buf.push_back(record);
    }

    fn retrieve(&self, query: Option<&str>, top_k: usize) -> Vec<MemoryRecord> {
        if top_k == 0 {
            return Vec::new();
        }
        let buf = self.read();
        match query.map(str::trim).filter(|q| !q.is_empty()) {
            None => last_k(buf.iter().cloned(), top_k),
            Some(q) => {
                let needle = q.to_lowercase();
                last_k(
                    buf.iter()
                        .filter(|r| r.content_text().to_lowercase().contains(&needle))
                        .cloned(),
                    top_k,
                )
            }
        }
    }

    fn clear(&self) {
        self.write().clear();
    }

    fn len(&self) -> usize {
        self.read().len()
    }
}

impl std::fmt::Display for ShortTermMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ShortTermMemory({} items)", self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::RecordKind;

    fn rec(text: &str) -> MemoryRecord {
        MemoryRecord::new(RecordKind::Step, text)
    }

    fn texts(records: &[MemoryRecord]) -> Vec<String> {
        records.iter().map(|r| r.content_text()).collect()
    }

    #[test]
    fn test_bounded_evicts_oldest() {
        let mem = ShortTermMemory::bounded(3);
        for t in ["r0", "r1", "r2", "r3"] {
            mem.add(rec(t));
        }
        assert_eq!(mem.len(), 3);
        let all = mem.retrieve(None, 3);
        assert_eq!(texts(&all), vec!["r1", "r2", "r3"]);
    }

    #[test]
    fn test_retrieve_empty_query_returns_recent_in_order() {
        let mem = ShortTermMemory::unbounded();
        for t in ["a", "b", "c", "d"] {
            mem.add(rec(t));
        }
        assert_eq!(texts(&mem.retrieve(Some(""), 2)), vec!["c", "d"]);
        assert_eq!(texts(&mem.retrieve(None, 10)), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_retrieve_substring_case_insensitive() {
        let mem = ShortTermMemory::unbounded();
        mem.add(rec("Weather in Tokyo"));
        mem.add(rec("stock price"));
        mem.add(rec("tokyo tower height"));
        mem.add(rec("TOKYO population"));
        let hits = mem.retrieve(Some("tokyo"), 2);
        assert_eq!(texts(&hits), vec!["tokyo tower height", "TOKYO population"]);
        assert!(hits.len() <= 2);
    }

    #[test]
    fn test_clear_empties_everything() {
        let mem = ShortTermMemory::bounded(5);
        mem.add(rec("x"));
        mem.add(rec("y"));
        mem.clear();
        assert!(mem.is_empty());
        assert!(mem.retrieve(None, 5).is_empty());
        assert!(mem.retrieve(Some("x"), 5).is_empty());
    }

    #[test]
    fn test_structured_content_is_searchable() {
        let mem = ShortTermMemory::unbounded();
        mem.add(MemoryRecord::step("get_weather", serde_json::json!({"temp": "72F Sunny"})));
        assert_eq!(mem.retrieve(Some("sunny"), 5).len(), 1);
        assert_eq!(mem.retrieve(Some("GET_WEATHER"), 5).len(), 1);
    }

    #[test]
    fn test_zero_top_k() {
        let mem = ShortTermMemory::unbounded();
        mem.add(rec("a"));
        assert!(mem.retrieve(None, 0).is_empty());
    }
}
