pub mod db;
pub mod generation_llm;
pub mod memory;
pub mod current_affairs;

pub use db::PgDocumentStore;
pub use generation_llm::OpenAiContentAdapter;
pub use memory::InMemoryDocumentStore;
pub use current_affairs::HttpScraperAdapter;
