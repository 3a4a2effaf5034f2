pub mod append;
mod columnar;
pub mod db;
pub mod normalize;
pub mod query;
pub mod schema;
pub mod write;

pub use append::AppendChannel;
pub use db::Store;
pub use schema::Table;
