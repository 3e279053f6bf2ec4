pub mod classify;
pub mod document;
pub mod selector;
