pub mod console;
pub mod export;
pub mod import;
pub mod splitter;

pub use import::{ImportError, ImportRunner, ImportSummary};
pub use splitter::{executable_statements, is_executable, split};
