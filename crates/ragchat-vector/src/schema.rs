use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

/// Bumped whenever the chunk table layout changes.
pub const SCHEMA_VERSION: &str = "1";

pub const META_SCHEMA_VERSION: &str = "schema_version";
pub const META_EMBEDDING_DIM: &str = "embedding_dim";

pub fn build_chunk_schema(dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("seq", DataType::Int64, false),
        Field::new("text", DataType::Utf8, false),
        // JSON-encoded string map
        Field::new("metadata", DataType::Utf8, false),
        Field::new(
            "embedding",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32),
            true,
        ),
    ]))
}

pub fn build_meta_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("key", DataType::Utf8, false),
        Field::new("value", DataType::Utf8, false),
        Field::new("updated_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
    ]))
}

pub fn meta_table_name(table: &str) -> String {
    format!("{table}_meta")
}
