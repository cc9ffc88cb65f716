use arrow_schema::{Schema, Field, DataType};
use std::sync::Arc;

pub const TABLE_NAME: &str = "chunks";
pub const ID_COLUMN: &str = "id";
pub const VECTOR_COLUMN: &str = "vector";
pub const DISTANCE_COLUMN: &str = "_distance";

/// `(id, vector)` rows; the vector width is whatever the embedder produced.
pub fn build_arrow_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new(ID_COLUMN, DataType::UInt64, false),
		Field::new(VECTOR_COLUMN, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}
