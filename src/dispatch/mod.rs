pub mod action;
pub mod effects;
pub mod resolve;
pub mod scroll;
