//! ChatStore の具体的な実装
//!
//! - `memory`: プロセス内に保持（再起動で消える）
//! - `file`: JSON Lines ファイルへの追記

pub mod file;
pub mod memory;

pub use file::FileChatStore;
pub use memory::InMemoryChatStore;
