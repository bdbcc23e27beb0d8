// src/schema/types.rs

use super::classify::TypeKind;
use crate::warehouse::ColumnInfo;
use serde::Serialize;

/// A target-table column as seen by the upload path.
#[derive(Debug, Serialize, PartialEq, Clone, Eq, Hash)]
pub struct ColumnDescriptor {
    pub name: String,
    pub kind: TypeKind,
    /// The driver's tag, kept for diagnostics.
    pub type_tag: String,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        let type_tag = kind.as_str().to_string();
        Self {
            name: name.into(),
            kind,
            type_tag,
        }
    }
}

impl From<&ColumnInfo> for ColumnDescriptor {
    fn from(info: &ColumnInfo) -> Self {
        Self {
            name: info.name.clone(),
            kind: TypeKind::classify(&info.type_tag),
            type_tag: info.type_tag.clone(),
        }
    }
}

/// Descriptors for every column except the surrogate key, in table order.
pub fn upload_columns(columns: &[ColumnInfo], surrogate_key: &str) -> Vec<ColumnDescriptor> {
    columns
        .iter()
        .filter(|c| c.name != surrogate_key)
        .map(ColumnDescriptor::from)
        .collect()
}
