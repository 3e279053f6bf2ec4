pub mod context;
pub mod handle;
pub mod messages;
