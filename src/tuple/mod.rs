//! Tuple values and layouts.
//!
//! These are the plain value types stored in heap pages:
//! - [`FieldType`] / [`Field`] - Fixed-width column types and values
//! - [`TupleDesc`] - Column layout of a table
//! - [`Tuple`] / [`RecordId`] - A row and where it is stored

mod field;
#[allow(clippy::module_inception)]
mod tuple;
mod tuple_desc;

pub use field::{Field, FieldType};
pub use tuple::{RecordId, Tuple};
pub use tuple_desc::{ColumnDesc, TupleDesc};
