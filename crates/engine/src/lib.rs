pub mod chunk;
pub mod context;
pub mod models;
pub mod prompt;
pub mod ranking;
pub mod status;
pub mod synthesis;

pub use chunk::*;
pub use context::*;
pub use models::*;
pub use status::*;
