//! Tuples and record ids.

use std::fmt;
use std::sync::Arc;

use crate::common::config::STRING_LEN;
use crate::common::PageId;

use super::{Field, TupleDesc};

/// Location of a stored tuple: its page and slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: usize,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: usize) -> Self {
        Self { page_id, slot }
    }
}

/// A row: field values laid out according to a [`TupleDesc`].
///
/// A tuple read from a heap file carries the [`RecordId`] of the slot it was
/// read from; deleting it uses that id to find the slot.
#[derive(Debug, Clone)]
pub struct Tuple {
    desc: Arc<TupleDesc>,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Create a tuple, checking the fields against the layout.
    ///
    /// Returns `None` if the number or types of the fields do not match, or
    /// if a text value is longer than [`STRING_LEN`] bytes and so could not
    /// be stored without losing data.
    pub fn new(desc: Arc<TupleDesc>, fields: Vec<Field>) -> Option<Self> {
        let matches = fields.len() == desc.num_fields()
            && fields
                .iter()
                .zip(desc.types())
                .all(|(f, t)| f.field_type() == t && fits(f));
        matches.then_some(Self {
            desc,
            fields,
            record_id: None,
        })
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, i: usize) -> Option<&Field> {
        self.fields.get(i)
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    /// Append the fixed-width encoding of all fields to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        for field in &self.fields {
            field.write_to(out);
        }
    }

    /// Decode a tuple with layout `desc` from the front of `data`.
    pub fn read_from(desc: &Arc<TupleDesc>, data: &[u8]) -> std::result::Result<Self, String> {
        let mut fields = Vec::with_capacity(desc.num_fields());
        let mut offset = 0;
        for ty in desc.types() {
            let rest = data.get(offset..).unwrap_or(&[]);
            fields.push(Field::read_from(ty, rest)?);
            offset += ty.byte_len();
        }
        Ok(Self {
            desc: Arc::clone(desc),
            fields,
            record_id: None,
        })
    }
}

fn fits(field: &Field) -> bool {
    match field {
        Field::Int(_) => true,
        Field::Text(s) => s.len() <= STRING_LEN,
    }
}

/// Tuples compare by layout and values; the record id is not part of a
/// tuple's identity.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.desc == other.desc && self.fields == other.fields
    }
}

impl Eq for Tuple {}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, "\t")?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}
