pub mod coordinator;
pub mod notify;
pub mod router;
pub mod store;
pub mod tabs;
