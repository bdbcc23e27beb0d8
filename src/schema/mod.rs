pub mod classify;
pub mod types;

pub use classify::{normalize_tag, TypeKind};
pub use types::{upload_columns, ColumnDescriptor};
