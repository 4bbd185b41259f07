//! 长期记忆：语义索引能力
//!
//! 契约为 add(document) -> id 与 retrieve(query, k) -> 排序后的 id；
//! 真实实现可接向量库，这里的 KeywordIndex 按小写词重叠打分，适合本地与测试。

use std::collections::{HashSet, VecDeque};
use std::sync::RwLock;

use uuid::Uuid;

/// 文档 ID
pub type DocumentId = Uuid;

/// 语义索引 trait：写入文档并按相关度检索
pub trait SemanticIndex: Send + Sync {
    /// 存入一段文本，返回文档 ID
    fn add(&self, document: &str) -> DocumentId;

    /// 按相关度降序返回至多 k 个文档 ID
    fn retrieve(&self, query: &str, k: usize) -> Vec<DocumentId>;

    /// 取回原文
    fn get(&self, id: &DocumentId) -> Option<String>;
}

struct IndexedDoc {
    id: DocumentId,
    text: String,
    tokens: HashSet<String>,
}

/// 关键词重叠索引，超过 max_entries 时淘汰最早写入的文档
pub struct KeywordIndex {
    docs: RwLock<VecDeque<IndexedDoc>>,
    max_entries: usize,
}

fn tokenize_lower(s: &str) -> HashSet<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.chars().count() > 1)
        .collect()
}

impl KeywordIndex {
    pub fn new(max_entries: usize) -> Self {
        Self {
            docs: RwLock::new(VecDeque::new()),
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for KeywordIndex {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl SemanticIndex for KeywordIndex {
    fn add(&self, document: &str) -> DocumentId {
        let id = Uuid::new_v4();
        let mut docs = self.docs.write().unwrap_or_else(|e| e.into_inner());
        docs.push_back(IndexedDoc {
            id,
            text: document.to_string(),
            tokens: tokenize_lower(document),
        });
        while docs.len() > self.max_entries {
            docs.pop_front();
        }
        id
    }

    fn retrieve(&self, query: &str, k: usize) -> Vec<DocumentId> {
        let query_tokens = tokenize_lower(query);
        if query_tokens.is_empty() || k == 0 {
            return Vec::new();
        }
        let docs = self.docs.read().unwrap_or_else(|e| e.into_inner());
        // 同分时较新的文档排前
        let mut scored: Vec<(usize, usize, DocumentId)> = docs
            .iter()
            .enumerate()
            .map(|(pos, d)| (query_tokens.intersection(&d.tokens).count(), pos, d.id))
            .filter(|(score, _, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
        scored.into_iter().take(k).map(|(_, _, id)| id).collect()
    }

    fn get(&self, id: &DocumentId) -> Option<String> {
        let docs = self.docs.read().unwrap_or_else(|e| e.into_inner());
        docs.iter().find(|d| &d.id == id).map(|d| d.text.clone())
    }
}

/// 批量取回原文（保持 ids 顺序，跳过已淘汰的文档）
pub fn resolve_documents(index: &dyn SemanticIndex, ids: &[DocumentId]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(**id))
        .filter_map(|id| index.get(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranks_by_overlap() {
        let index = KeywordIndex::default();
        let weak = index.add("weather report");
        let strong = index.add("tokyo weather report for today");
        index.add("unrelated stock prices");
        let hits = index.retrieve("tokyo weather", 5);
        assert_eq!(hits, vec![strong, weak]);
        assert_eq!(
            resolve_documents(&index, &hits)[0],
            "tokyo weather report for today"
        );
    }

    #[test]
    fn test_evicts_oldest_beyond_max_entries() {
        let index = KeywordIndex::new(2);
        let first = index.add("alpha beta");
        index.add("gamma delta");
        index.add("epsilon zeta");
        assert_eq!(index.len(), 2);
        assert!(index.get(&first).is_none());
        assert!(index.retrieve("alpha", 3).is_empty());
    }

    #[test]
    fn test_empty_query_returns_nothing() {
        let index = KeywordIndex::default();
        index.add("something");
        assert!(index.retrieve("  ", 3).is_empty());
    }
}
