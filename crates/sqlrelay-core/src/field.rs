//! Declarative column model used by the CREATE TABLE builder

/// Logical field data type.
///
/// The sized integer variants exist only as constructor input; `Field::new`
/// collapses them to `Int`/`Uint` after assigning the matching default size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float,
    String,
    Text,
    Json,
    Time,
    Bytes,
}

impl DataType {
    /// Default value-range size for the sized integer sub-types
    fn default_size(self) -> u64 {
        match self {
            DataType::Int8 => 127,
            DataType::Int16 => 32767,
            DataType::Int32 => 2147483647,
            DataType::Int64 => 9223372036854775807,
            DataType::Uint8 => 255,
            DataType::Uint16 => 65535,
            DataType::Uint32 => 4294967295,
            DataType::Uint64 => 18446744073709551615,
            _ => 0,
        }
    }

    /// Collapse sized integer sub-types to their base type
    pub(crate) fn collapse(self) -> DataType {
        match self {
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => DataType::Int,
            DataType::Uint8 | DataType::Uint16 | DataType::Uint32 | DataType::Uint64 => {
                DataType::Uint
            }
            other => other,
        }
    }
}

/// A declarative column definition consumed by `Dialect::data_type_of`
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    /// Verbatim SQL type text; bypasses the logical mapping when set
    pub raw_data_type: Option<String>,
    pub comment: String,
    pub size: u64,
    pub precision: u32,
    pub scale: u32,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub not_null: bool,
}

impl Field {
    /// Create a field; sized integer sub-types pick up their default size
    /// before collapsing to `Int`/`Uint`.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            size: data_type.default_size(),
            data_type: data_type.collapse(),
            raw_data_type: None,
            comment: String::new(),
            precision: 0,
            scale: 0,
            primary_key: false,
            auto_increment: false,
            not_null: true,
        }
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    pub fn scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn raw_data_type(mut self, raw: impl Into<String>) -> Self {
        self.raw_data_type = Some(raw.into());
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark as auto-increment. Together with `primary_key` this implies
    /// not-null regardless of `nullable`.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.not_null = false;
        self
    }

    /// Whether the column must be emitted as required
    pub fn required(&self) -> bool {
        self.not_null || (self.auto_increment && self.primary_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sized_ints_collapse_with_default_size() {
        let f = Field::new("age", DataType::Int32);
        assert_eq!(f.data_type, DataType::Int);
        assert_eq!(f.size, 2147483647);

        let f = Field::new("flags", DataType::Uint16);
        assert_eq!(f.data_type, DataType::Uint);
        assert_eq!(f.size, 65535);
    }

    #[test]
    fn explicit_size_survives() {
        let f = Field::new("name", DataType::String).size(100);
        assert_eq!(f.size, 100);
    }

    #[test]
    fn auto_increment_primary_key_is_required() {
        let f = Field::new("id", DataType::Int64)
            .primary_key()
            .auto_increment()
            .nullable();
        assert!(f.required());
    }
}
