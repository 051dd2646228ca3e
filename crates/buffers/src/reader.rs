//! Binary buffer reader with cursor tracking.

use crate::{BufferError, LENGTH_FLAG};

/// A binary buffer reader that reads data from a byte slice.
///
/// Every read is bounds-checked and returns [`BufferError::EndOfBuffer`]
/// instead of panicking, leaving the cursor where it was.
///
/// # Example
///
/// ```
/// use replisync_buffers::Reader;
///
/// let data = [0x01, 0x02, 0x03];
/// let mut reader = Reader::new(&data);
///
/// assert_eq!(reader.try_u8(), Ok(0x01));
/// assert_eq!(reader.try_u16(), Ok(0x0203));
/// ```
pub struct Reader<'a> {
    /// The underlying byte slice.
    pub uint8: &'a [u8],
    /// Current cursor position.
    pub x: usize,
}

impl<'a> Reader<'a> {
    pub fn new(uint8: &'a [u8]) -> Self {
        Self { uint8, x: 0 }
    }

    /// Returns the number of remaining bytes.
    pub fn size(&self) -> usize {
        self.uint8.len().saturating_sub(self.x)
    }

    /// Advances the cursor by the given number of bytes.
    pub fn skip(&mut self, length: usize) -> Result<(), BufferError> {
        self.try_buf(length).map(drop)
    }

    /// Reads exactly `N` bytes.
    #[inline]
    fn take<const N: usize>(&mut self) -> Result<[u8; N], BufferError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.try_buf(N)?);
        Ok(out)
    }

    /// Reads `size` raw bytes and advances the cursor.
    pub fn try_buf(&mut self, size: usize) -> Result<&'a [u8], BufferError> {
        let end = self.x.checked_add(size).ok_or(BufferError::EndOfBuffer)?;
        let bin = self.uint8.get(self.x..end).ok_or(BufferError::EndOfBuffer)?;
        self.x = end;
        Ok(bin)
    }

    /// Reads a string length prefix, splitting off the [`LENGTH_FLAG`] bit.
    ///
    /// Returns `(length, flagged)`.
    pub fn try_length(&mut self) -> Result<(usize, bool), BufferError> {
        let raw = self.try_u32()?;
        Ok(((raw & !LENGTH_FLAG) as usize, raw & LENGTH_FLAG != 0))
    }

    /// Reads `units` big-endian UTF-16 code units.
    pub fn try_utf16_units(&mut self, units: usize) -> Result<Vec<u16>, BufferError> {
        let bytes = self.try_buf(units.checked_mul(2).ok_or(BufferError::EndOfBuffer)?)?;
        Ok(bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect())
    }

    /// Reads `units` UTF-16 code units and decodes them.
    ///
    /// The cursor advances past the payload even when it does not decode,
    /// so the caller can recover and keep reading the next record.
    pub fn try_utf16(&mut self, units: usize) -> Result<String, BufferError> {
        let units = self.try_utf16_units(units)?;
        String::from_utf16(&units).map_err(|_| BufferError::InvalidUtf16)
    }

    /// Reads a length-prefixed UTF-16 string written by `Writer::str_utf16`.
    pub fn try_str_utf16(&mut self) -> Result<String, BufferError> {
        let (units, _) = self.try_length()?;
        self.try_utf16(units)
    }

    /// Reads a length-prefixed ASCII string written by `Writer::str_ascii`.
    ///
    /// Like [`Reader::try_utf16`], the payload is consumed before validation.
    pub fn try_str_ascii(&mut self) -> Result<String, BufferError> {
        let (length, _) = self.try_length()?;
        let bytes = self.try_buf(length)?;
        if !bytes.is_ascii() {
            return Err(BufferError::InvalidAscii);
        }
        Ok(bytes.iter().map(|&b| b as char).collect())
    }
}

/// Fixed-width big-endian readers.
macro_rules! take_be {
    ($($name:ident: $ty:ty),* $(,)?) => {
        impl Reader<'_> {
            $(
                #[doc = concat!("Reads a `", stringify!($ty), "` (big-endian).")]
                #[inline]
                pub fn $name(&mut self) -> Result<$ty, BufferError> {
                    self.take().map(<$ty>::from_be_bytes)
                }
            )*
        }
    };
}

take_be!(
    try_u8: u8,
    try_i8: i8,
    try_u16: u16,
    try_i16: i16,
    try_u32: u32,
    try_i32: i32,
    try_u64: u64,
    try_f32: f32,
    try_f64: f64,
);
