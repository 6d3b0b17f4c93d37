pub mod client;
pub mod document;
pub mod memory_store;
pub mod pipeline;
pub mod query_builder;
pub mod surreal_store;
pub mod table_names;
pub mod transaction;
