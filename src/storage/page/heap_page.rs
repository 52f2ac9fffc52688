//! HeapPage - the in-memory form of one heap file page.
//!
//! A [`HeapPage`] decodes a page-sized block into a slot array of tuples and
//! encodes it back. Encoding is deterministic: the same slot contents always
//! produce the same bytes, with free slots and trailing space zero-filled.

use std::sync::Arc;

use crate::common::{Error, PageId, Result, TransactionId};
use crate::tuple::{RecordId, Tuple, TupleDesc};

use super::page_header::PageHeader;

/// A heap page: a fixed number of tuple slots plus dirty tracking.
///
/// # Byte Layout
/// ```text
/// ┌────────────┬────────────────┬─────────┬─────────┬─────┬──────────┐
/// │ PageHeader │ (bitmap incl.) │ slot 0  │ slot 1  │ ... │ padding  │
/// └────────────┴────────────────┴─────────┴─────────┴─────┴──────────┘
/// ```
///
/// The slot count depends only on the page size and the tuple width of the
/// table's [`TupleDesc`]; see [`PageHeader::num_slots`].
///
/// Equality compares identity and slot contents; the dirty marker is not
/// part of the encoded form and is ignored.
#[derive(Debug, Clone)]
pub struct HeapPage {
    page_id: PageId,
    desc: Arc<TupleDesc>,
    page_size: usize,
    slots: Vec<Option<Tuple>>,
    /// Transaction that last modified the page, if it has unflushed changes.
    dirtier: Option<TransactionId>,
}

impl HeapPage {
    /// Create a page with every slot free.
    pub fn empty(page_id: PageId, desc: Arc<TupleDesc>, page_size: usize) -> Self {
        let num_slots = PageHeader::num_slots(page_size, desc.byte_len());
        Self {
            page_id,
            desc,
            page_size,
            slots: vec![None; num_slots],
            dirtier: None,
        }
    }

    /// Decode a page from exactly `page_size` bytes.
    ///
    /// # Errors
    /// `Error::Format` if the block has the wrong length, the header is
    /// inconsistent, the checksum does not match, or a used slot does not
    /// hold a valid tuple.
    pub fn from_bytes(
        page_id: PageId,
        desc: Arc<TupleDesc>,
        page_size: usize,
        data: &[u8],
    ) -> Result<Self> {
        if data.len() != page_size {
            return Err(Error::format(
                page_id,
                format!("expected {} bytes, got {}", page_size, data.len()),
            ));
        }

        let tuple_len = desc.byte_len();
        let num_slots = PageHeader::num_slots(page_size, tuple_len);
        let header =
            PageHeader::from_bytes(data, num_slots).map_err(|r| Error::format(page_id, r))?;
        if !header.verify_checksum(data) {
            return Err(Error::format(page_id, "checksum mismatch"));
        }

        let base = PageHeader::size(num_slots);
        let mut slots = Vec::with_capacity(num_slots);
        for slot in 0..num_slots {
            if !header.is_used(slot) {
                slots.push(None);
                continue;
            }
            let start = base + slot * tuple_len;
            let mut tuple = Tuple::read_from(&desc, &data[start..start + tuple_len])
                .map_err(|r| Error::format(page_id, format!("slot {}: {}", slot, r)))?;
            tuple.set_record_id(Some(RecordId::new(page_id, slot)));
            slots.push(Some(tuple));
        }

        Ok(Self {
            page_id,
            desc,
            page_size,
            slots,
            dirtier: None,
        })
    }

    /// Encode the page into `page_size` bytes, checksum included.
    pub fn to_bytes(&self) -> Vec<u8> {
        let num_slots = self.slots.len();
        let tuple_len = self.desc.byte_len();

        let mut header = PageHeader::new(num_slots);
        let mut data = Vec::with_capacity(self.page_size);
        data.resize(PageHeader::size(num_slots), 0);
        for (slot, tuple) in self.slots.iter().enumerate() {
            match tuple {
                Some(t) => {
                    header.set_used(slot, true);
                    t.write_to(&mut data);
                }
                None => data.resize(data.len() + tuple_len, 0),
            }
        }
        data.resize(self.page_size, 0);

        header.write_to(&mut data);
        header.checksum = PageHeader::compute_checksum(&data);
        header.write_to(&mut data);
        data
    }

    #[inline]
    pub fn id(&self) -> PageId {
        self.page_id
    }

    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[inline]
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn num_empty_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_none()).count()
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        matches!(self.slots.get(slot), Some(Some(_)))
    }

    /// Tuple stored in `slot`, if any.
    pub fn tuple(&self, slot: usize) -> Option<&Tuple> {
        self.slots.get(slot).and_then(|s| s.as_ref())
    }

    /// Stored tuples in slot order.
    pub fn tuples(&self) -> impl Iterator<Item = &Tuple> + '_ {
        self.slots.iter().flatten()
    }

    /// Store `tuple` in the first free slot and stamp its record id.
    ///
    /// # Errors
    /// - `Error::SchemaMismatch` if the tuple's layout differs from the page's
    /// - `Error::PageFull` if no slot is free
    pub fn insert_tuple(&mut self, mut tuple: Tuple) -> Result<RecordId> {
        if **tuple.desc() != *self.desc {
            return Err(Error::SchemaMismatch(self.page_id.table_id()));
        }
        let slot = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(Error::PageFull(self.page_id))?;

        let rid = RecordId::new(self.page_id, slot);
        tuple.set_record_id(Some(rid));
        self.slots[slot] = Some(tuple);
        Ok(rid)
    }

    /// Free the slot named by the tuple's record id.
    ///
    /// # Errors
    /// - `Error::MissingRecordId` if the tuple was never stored
    /// - `Error::InvalidArgument` if the record id points at another page or
    ///   past the last slot
    /// - `Error::SlotEmpty` if the slot is already free
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        let rid = tuple.record_id().ok_or(Error::MissingRecordId)?;
        if rid.page_id != self.page_id {
            return Err(Error::InvalidArgument(format!(
                "tuple belongs to {}, not {}",
                rid.page_id, self.page_id
            )));
        }
        let slot = self.slots.get_mut(rid.slot).ok_or_else(|| {
            Error::InvalidArgument(format!("{} has no slot {}", rid.page_id, rid.slot))
        })?;
        if slot.take().is_none() {
            return Err(Error::SlotEmpty {
                page_id: self.page_id,
                slot: rid.slot,
            });
        }
        Ok(())
    }

    /// Mark the page dirty on behalf of `txn`, or clean with `None`.
    #[inline]
    pub fn mark_dirty(&mut self, txn: Option<TransactionId>) {
        self.dirtier = txn;
    }

    /// Transaction holding unflushed changes to this page.
    #[inline]
    pub fn dirtier(&self) -> Option<TransactionId> {
        self.dirtier
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirtier.is_some()
    }
}

impl PartialEq for HeapPage {
    fn eq(&self, other: &Self) -> bool {
        self.page_id == other.page_id
            && self.page_size == other.page_size
            && self.desc == other.desc
            && self.slots == other.slots
    }
}

impl Eq for HeapPage {}
