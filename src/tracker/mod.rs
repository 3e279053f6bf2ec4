pub mod events;
pub mod intersection;
pub mod tracker;
