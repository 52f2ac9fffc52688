//! Tuple layout description.

use std::fmt;

use super::FieldType;

/// One column of a [`TupleDesc`].
#[derive(Debug, Clone)]
pub struct ColumnDesc {
    pub field_type: FieldType,
    pub name: Option<String>,
}

/// The layout of a tuple: an ordered list of typed, optionally named columns.
///
/// Two descriptors are equal when their column types match position by
/// position; names are informational and do not take part in equality.
#[derive(Debug, Clone)]
pub struct TupleDesc {
    columns: Vec<ColumnDesc>,
}

impl TupleDesc {
    /// Create an unnamed layout from column types.
    pub fn new(types: Vec<FieldType>) -> Self {
        Self {
            columns: types
                .into_iter()
                .map(|field_type| ColumnDesc {
                    field_type,
                    name: None,
                })
                .collect(),
        }
    }

    /// Create a layout with named columns.
    pub fn with_names<S: Into<String>>(columns: Vec<(FieldType, S)>) -> Self {
        Self {
            columns: columns
                .into_iter()
                .map(|(field_type, name)| ColumnDesc {
                    field_type,
                    name: Some(name.into()),
                })
                .collect(),
        }
    }

    pub fn num_fields(&self) -> usize {
        self.columns.len()
    }

    pub fn field_type(&self, i: usize) -> Option<FieldType> {
        self.columns.get(i).map(|c| c.field_type)
    }

    pub fn field_name(&self, i: usize) -> Option<&str> {
        self.columns.get(i).and_then(|c| c.name.as_deref())
    }

    /// Index of the first column called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.as_deref() == Some(name))
    }

    pub fn types(&self) -> impl Iterator<Item = FieldType> + '_ {
        self.columns.iter().map(|c| c.field_type)
    }

    /// Serialized width of one tuple with this layout, in bytes.
    pub fn byte_len(&self) -> usize {
        self.types().map(|t| t.byte_len()).sum()
    }
}

impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.num_fields() == other.num_fields() && self.types().eq(other.types())
    }
}

impl Eq for TupleDesc {}

impl fmt::Display for TupleDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}({})", c.field_type, c.name.as_deref().unwrap_or("null"))?;
        }
        Ok(())
    }
}
