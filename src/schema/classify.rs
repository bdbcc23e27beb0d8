use serde::Serialize;

/// Semantic kind of a column, which decides how its cells are normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TypeKind {
    Timestamp,
    Text,
    Numeric,
    /// Tag not in the table; cells pass through untouched.
    Unknown,
}

impl TypeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeKind::Timestamp => "TIMESTAMP",
            TypeKind::Text => "TEXT",
            TypeKind::Numeric => "NUMERIC",
            TypeKind::Unknown => "UNKNOWN",
        }
    }

    /// Classify a driver type tag by exact match on its normalized form.
    pub fn classify(raw_tag: &str) -> Self {
        match normalize_tag(raw_tag).as_str() {
            "DATETIME" | "TIMESTAMP" | "DATE" | "DATE32" | "DATE64" | "TIMESTAMP_S"
            | "TIMESTAMP_MS" | "TIMESTAMP_NS" | "TIMESTAMPTZ" => TypeKind::Timestamp,

            "STRING" | "FIXED_CHAR" | "NCHAR" | "FIXED_NCHAR" | "CHAR" | "VARCHAR"
            | "VARCHAR2" | "NVARCHAR2" | "TEXT" | "UTF8" | "LARGEUTF8" | "LONG_STRING" => {
                TypeKind::Text
            }

            "NUMBER" | "NATIVE_FLOAT" | "NATIVE_INT" | "INTEGER" | "INT" | "BIGINT"
            | "SMALLINT" | "TINYINT" | "HUGEINT" | "DOUBLE" | "FLOAT" | "REAL" | "DECIMAL"
            | "NUMERIC" | "INT8" | "INT16" | "INT32" | "INT64" | "UINT8" | "UINT16"
            | "UINT32" | "UINT64" | "FLOAT16" | "FLOAT32" | "FLOAT64" | "DECIMAL128"
            | "DECIMAL256" => TypeKind::Numeric,

            _ => TypeKind::Unknown,
        }
    }
}

/// Reduce a driver tag to its bare upper-case name:
/// `<class 'cx_Oracle.DATETIME'>` → `DATETIME`, `Decimal128(18, 3)` → `DECIMAL128`,
/// `Timestamp(Microsecond, None)` → `TIMESTAMP`.
pub fn normalize_tag(raw: &str) -> String {
    let mut tag: String = raw
        .replace("<class", "")
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '\'' | '"' | '<' | '>'))
        .collect();

    if let Some(open) = tag.find('(') {
        tag.truncate(open);
    }
    if let Some(dot) = tag.rfind('.') {
        tag = tag[dot + 1..].to_string();
    }
    tag.to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_class_tags() {
        assert_eq!(
            TypeKind::classify("<class 'cx_Oracle.DATETIME'>"),
            TypeKind::Timestamp
        );
        assert_eq!(TypeKind::classify("<class 'cx_Oracle.STRING'>"), TypeKind::Text);
        assert_eq!(TypeKind::classify("<class 'cx_Oracle.NUMBER'>"), TypeKind::Numeric);
        assert_eq!(TypeKind::classify("<class 'cx_Oracle.BLOB'>"), TypeKind::Unknown);
    }

    #[test]
    fn sql_and_arrow_tags() {
        assert_eq!(TypeKind::classify("VARCHAR"), TypeKind::Text);
        assert_eq!(TypeKind::classify(" varchar2 "), TypeKind::Text);
        assert_eq!(TypeKind::classify("DECIMAL(18,3)"), TypeKind::Numeric);
        assert_eq!(TypeKind::classify("Decimal128(18, 3)"), TypeKind::Numeric);
        assert_eq!(TypeKind::classify("Timestamp(Microsecond, None)"), TypeKind::Timestamp);
        assert_eq!(TypeKind::classify("Date32"), TypeKind::Timestamp);
        assert_eq!(TypeKind::classify("Utf8"), TypeKind::Text);
        assert_eq!(TypeKind::classify("Int64"), TypeKind::Numeric);
        assert_eq!(TypeKind::classify("Boolean"), TypeKind::Unknown);
        assert_eq!(TypeKind::classify(""), TypeKind::Unknown);
    }

    #[test]
    fn normalization_strips_wrapping() {
        assert_eq!(normalize_tag("<class 'cx_Oracle.FIXED_CHAR'>"), "FIXED_CHAR");
        assert_eq!(normalize_tag("\"timestamp\""), "TIMESTAMP");
    }
}
