pub mod chat;
pub mod report;

pub use chat::*;
pub use report::*;
