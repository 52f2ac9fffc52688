//! Heap page header: checksum and slot-occupancy bitmap.
//!
//! Every heap page starts with a [`PageHeader`]:
//! - CRC32 checksum of the rest of the page
//! - one occupancy bit per tuple slot

/// Metadata stored at the beginning of every heap page.
///
/// # Layout
/// ```text
/// Offset  Size              Field
/// ------  ----              -----
/// 0       4                 checksum (CRC32, little-endian)
/// 4       ceil(slots / 8)   slot bitmap, slot i = bit (i % 8) of byte (i / 8)
/// ```
///
/// The tuple records follow the bitmap directly.
///
/// # Checksum
/// The checksum covers every byte after the checksum field. A stored
/// checksum of zero marks a page that was never written with a checksum
/// (e.g. a zero-filled page) and is not verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHeader {
    /// CRC32 checksum of the page contents.
    pub checksum: u32,
    bitmap: Vec<u8>,
    num_slots: usize,
}

impl PageHeader {
    pub const OFFSET_CHECKSUM: usize = 0;
    pub const OFFSET_BITMAP: usize = 4;

    /// Number of tuple slots that fit in a page.
    ///
    /// Each slot costs its record width in bytes plus one bitmap bit.
    pub fn num_slots(page_size: usize, tuple_len: usize) -> usize {
        (page_size.saturating_sub(Self::OFFSET_BITMAP) * 8) / (tuple_len * 8 + 1)
    }

    /// Bitmap bytes needed for `num_slots` slots.
    pub fn bitmap_len(num_slots: usize) -> usize {
        num_slots.div_ceil(8)
    }

    /// Total header size for `num_slots` slots.
    pub fn size(num_slots: usize) -> usize {
        Self::OFFSET_BITMAP + Self::bitmap_len(num_slots)
    }

    /// Create a header with every slot free.
    pub fn new(num_slots: usize) -> Self {
        Self {
            checksum: 0,
            bitmap: vec![0u8; Self::bitmap_len(num_slots)],
            num_slots,
        }
    }

    /// Read a header for a page with `num_slots` slots.
    ///
    /// Fails if `data` is too short to hold the header or if bits are set
    /// for slots past `num_slots`.
    pub fn from_bytes(data: &[u8], num_slots: usize) -> Result<Self, String> {
        let size = Self::size(num_slots);
        if data.len() < size {
            return Err(format!(
                "truncated header: need {} bytes, have {}",
                size,
                data.len()
            ));
        }

        let checksum = u32::from_le_bytes([
            data[Self::OFFSET_CHECKSUM],
            data[Self::OFFSET_CHECKSUM + 1],
            data[Self::OFFSET_CHECKSUM + 2],
            data[Self::OFFSET_CHECKSUM + 3],
        ]);
        let bitmap = data[Self::OFFSET_BITMAP..size].to_vec();

        let header = Self {
            checksum,
            bitmap,
            num_slots,
        };
        let tail_bits = Self::bitmap_len(num_slots) * 8 - num_slots;
        if tail_bits > 0 {
            let last = header.bitmap[header.bitmap.len() - 1];
            if last >> (8 - tail_bits) != 0 {
                return Err(format!(
                    "slot bitmap marks slots beyond the {} available",
                    num_slots
                ));
            }
        }
        Ok(header)
    }

    /// Write this header to the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data` is shorter than the header.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(
            data.len() >= Self::size(self.num_slots),
            "buffer too small for PageHeader"
        );
        data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&self.checksum.to_le_bytes());
        data[Self::OFFSET_BITMAP..Self::OFFSET_BITMAP + self.bitmap.len()]
            .copy_from_slice(&self.bitmap);
    }

    #[inline]
    pub fn is_used(&self, slot: usize) -> bool {
        slot < self.num_slots && self.bitmap[slot / 8] & (1 << (slot % 8)) != 0
    }

    pub fn set_used(&mut self, slot: usize, used: bool) {
        assert!(slot < self.num_slots, "slot {} out of range", slot);
        if used {
            self.bitmap[slot / 8] |= 1 << (slot % 8);
        } else {
            self.bitmap[slot / 8] &= !(1 << (slot % 8));
        }
    }

    pub fn used_count(&self) -> usize {
        self.bitmap.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Compute the CRC32 checksum of a page.
    ///
    /// Everything after the checksum field is hashed.
    pub fn compute_checksum(page_data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&page_data[Self::OFFSET_CHECKSUM + 4..]);
        hasher.finalize()
    }

    /// Check the stored checksum against the page contents.
    ///
    /// Always `true` for a zero checksum.
    pub fn verify_checksum(&self, page_data: &[u8]) -> bool {
        self.checksum == 0 || self.checksum == Self::compute_checksum(page_data)
    }
}
