pub mod allocator;
pub mod alphabet;
pub mod label;
pub mod pool;
