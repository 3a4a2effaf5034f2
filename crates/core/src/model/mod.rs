pub mod log;
pub mod metric;
pub mod resource;
pub mod scope;
pub mod span;
