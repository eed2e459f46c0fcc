mod error;
pub mod find_file;
pub mod hardware;
mod registry;
pub mod web_search;

pub use error::ToolError;
pub use registry::ToolRegistry;
