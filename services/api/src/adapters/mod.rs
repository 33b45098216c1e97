pub mod chat_llm;
pub mod db;
pub mod memory;
pub mod vision_llm;
pub mod wordpress;

pub use chat_llm::OpenAiChatAdapter;
pub use db::DbAdapter;
pub use memory::InMemoryDb;
pub use vision_llm::OpenAiVisionAdapter;
pub use wordpress::{NoopCrmAdapter, WordPressAdapter};
