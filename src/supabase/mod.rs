//! Supabase table access: PostgREST query builder, the `TableClient` seam
//! and its HTTP and in-memory implementations.

pub mod client;
pub mod memory;
pub mod query;

pub use client::{decode_first, decode_rows, PostgrestClient, TableClient};
pub use memory::InMemoryTables;
pub use query::TableQuery;
