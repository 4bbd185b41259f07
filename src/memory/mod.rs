//! 记忆层：对话历史（ReAct 记录）、短期记录日志、长期语义索引

pub mod conversation;
pub mod long_term;
pub mod record;
pub mod store;

pub use conversation::{ConversationMemory, Message, Role};
pub use long_term::{resolve_documents, DocumentId, KeywordIndex, SemanticIndex};
pub use record::{MemoryRecord, RecordKind};
pub use store::{MemoryStore, ShortTermMemory};
