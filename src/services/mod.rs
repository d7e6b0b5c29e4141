pub mod cache;
pub mod collectors;
pub mod profile;
pub mod queue;
pub mod recommendation;
pub mod store;
