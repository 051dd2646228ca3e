//! Binary buffer writer with auto-growing capacity.

/// Reserved high bit of a string length prefix.
///
/// Codecs may set it on a prefix they have already written (see
/// [`Writer::u32_at`]) to attach a one-bit flag to a string without spending
/// an extra byte. Lengths never reach it because strings are bounded well
/// below 2^31 code units.
pub const LENGTH_FLAG: u32 = 0x8000_0000;

/// A binary buffer writer that grows automatically as needed.
///
/// The cursor `x` is public: a codec that speculatively writes a record and
/// then finds it redundant rolls back by assigning an earlier offset to `x`.
///
/// # Example
///
/// ```
/// use replisync_buffers::Writer;
///
/// let mut writer = Writer::new();
/// writer.u8(0x01);
/// writer.u16(0x0203);
/// let data = writer.flush();
/// assert_eq!(data, [0x01, 0x02, 0x03]);
/// ```
pub struct Writer {
    /// The underlying byte buffer.
    pub uint8: Vec<u8>,
    /// Position where last flush happened.
    pub x0: usize,
    /// Current cursor position.
    pub x: usize,
    /// Allocation size when buffer needs to grow.
    alloc_size: usize,
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer {
    /// Creates a new writer with default allocation size (4KB).
    pub fn new() -> Self {
        Self::with_alloc_size(4 * 1024)
    }

    /// Creates a new writer with custom allocation size.
    pub fn with_alloc_size(alloc_size: usize) -> Self {
        let uint8 = vec![0u8; alloc_size];
        Self {
            uint8,
            x0: 0,
            x: 0,
            alloc_size,
        }
    }

    /// Ensures the buffer has at least `capacity` bytes available.
    ///
    /// This is the `grow` of the stream contract: call it before a write
    /// whose length is only known as an upper bound. Growing never moves
    /// written bytes, so offsets saved for rollback or backpatching stay
    /// valid. Space is reclaimed by [`Writer::flush`] instead.
    pub fn ensure_capacity(&mut self, capacity: usize) {
        let remaining = self.uint8.len().saturating_sub(self.x);
        if remaining < capacity {
            let required = self.x + capacity;
            let stepped = self.uint8.len() + self.alloc_size;
            let new_size = if required <= stepped {
                stepped
            } else {
                required * 2
            };
            self.grow(new_size);
        }
    }

    fn grow(&mut self, new_size: usize) {
        self.uint8.resize(new_size, 0);
    }

    /// Number of bytes written since the last flush.
    pub fn len(&self) -> usize {
        self.x - self.x0
    }

    /// Returns `true` when nothing was written since the last flush.
    pub fn is_empty(&self) -> bool {
        self.x == self.x0
    }

    /// Returns the written data and rewinds the writer to the start of its
    /// buffer, so a long-lived writer reuses the same storage. Offsets saved
    /// before a flush are invalidated by it.
    pub fn flush(&mut self) -> Vec<u8> {
        let result = self.uint8[self.x0..self.x].to_vec();
        self.x0 = 0;
        self.x = 0;
        result
    }

    /// Appends raw bytes at the cursor.
    #[inline]
    fn put(&mut self, bytes: &[u8]) {
        self.ensure_capacity(bytes.len());
        self.uint8[self.x..self.x + bytes.len()].copy_from_slice(bytes);
        self.x += bytes.len();
    }

    /// Overwrites four already-written bytes at `pos` with `val` (big-endian).
    ///
    /// Used to backpatch counters whose value is only known after the
    /// payload they describe has been written. The cursor does not move.
    ///
    /// # Panics
    ///
    /// Panics if `pos + 4` is past the cursor.
    #[inline]
    pub fn u32_at(&mut self, pos: usize, val: u32) {
        assert!(pos + 4 <= self.x, "u32_at past the write cursor");
        self.uint8[pos..pos + 4].copy_from_slice(&val.to_be_bytes());
    }

    /// Writes a byte slice.
    pub fn buf(&mut self, buf: &[u8]) {
        self.put(buf);
    }

    /// Writes a length-prefixed UTF-16 string: `[units:u32][unit:u16]*`.
    ///
    /// Returns the offset of the length prefix so callers can flag it.
    pub fn str_utf16(&mut self, s: &str) -> usize {
        let units = s.encode_utf16().count();
        self.ensure_capacity(4 + 2 * units);
        let prefix = self.x;
        self.u32(units as u32);
        for unit in s.encode_utf16() {
            self.put(&unit.to_be_bytes());
        }
        prefix
    }

    /// Writes a length-prefixed ASCII string: `[len:u32][byte]*`.
    ///
    /// Characters outside the 7-bit range are written as `?`.
    pub fn str_ascii(&mut self, s: &str) {
        let bytes: Vec<u8> = s
            .chars()
            .map(|ch| if ch.is_ascii() { ch as u8 } else { b'?' })
            .collect();
        self.u32(bytes.len() as u32);
        self.put(&bytes);
    }
}

/// Fixed-width big-endian writers.
macro_rules! put_be {
    ($($name:ident: $ty:ty),* $(,)?) => {
        impl Writer {
            $(
                #[doc = concat!("Writes a `", stringify!($ty), "` (big-endian).")]
                #[inline]
                pub fn $name(&mut self, val: $ty) {
                    self.put(&val.to_be_bytes());
                }
            )*
        }
    };
}

put_be!(u8: u8, i8: i8, u16: u16, i16: i16, u32: u32, i32: i32, u64: u64, f32: f32, f64: f64);
