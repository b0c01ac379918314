//! Raw memory buffers read and written through a [`StructLayout`].
//!
//! A [`StructBuffer`] is zeroed, 8-byte aligned storage sized for one
//! structure. It can be written field by field (input structures such
//! as `utimbuf`) but it cannot be read. Reading requires a [`Populated`]
//! buffer, which only exists after the filling call reported success.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, Result};
use crate::field::{Field, FieldKind, Scalar, StructLayout};

/// Seconds plus optional nanoseconds since the Unix epoch
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp {
    pub sec: i64,
    pub nsec: u32,
}

impl Timestamp {
    pub const fn new(sec: i64, nsec: u32) -> Self {
        Self { sec, nsec }
    }

    pub const fn from_secs(sec: i64) -> Self {
        Self { sec, nsec: 0 }
    }

    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(d) => Self::new(d.as_secs() as i64, d.subsec_nanos()),
            Err(e) => {
                // Before the epoch: floor to whole seconds, keep nsec positive
                let d = e.duration();
                let mut sec = -(d.as_secs() as i64);
                let mut nsec = d.subsec_nanos();
                if nsec > 0 {
                    sec -= 1;
                    nsec = 1_000_000_000 - nsec;
                }
                Self::new(sec, nsec)
            }
        }
    }

    pub fn to_system_time(&self) -> SystemTime {
        if self.sec >= 0 {
            UNIX_EPOCH + Duration::new(self.sec as u64, self.nsec)
        } else {
            UNIX_EPOCH - Duration::from_secs(self.sec.unsigned_abs()) + Duration::from_nanos(self.nsec as u64)
        }
    }
}

fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

fn read_scalar(bytes: &[u8], scalar: Scalar) -> i128 {
    match scalar {
        Scalar::U8 => bytes[0] as i128,
        Scalar::I8 => bytes[0] as i8 as i128,
        Scalar::U16 => u16::from_ne_bytes(array(bytes)) as i128,
        Scalar::I16 => i16::from_ne_bytes(array(bytes)) as i128,
        Scalar::U32 => u32::from_ne_bytes(array(bytes)) as i128,
        Scalar::I32 => i32::from_ne_bytes(array(bytes)) as i128,
        Scalar::U64 => u64::from_ne_bytes(array(bytes)) as i128,
        Scalar::I64 => i64::from_ne_bytes(array(bytes)) as i128,
    }
}

fn write_scalar(bytes: &mut [u8], scalar: Scalar, value: i128) -> Option<()> {
    match scalar {
        Scalar::U8 => bytes[..1].copy_from_slice(&u8::try_from(value).ok()?.to_ne_bytes()),
        Scalar::I8 => bytes[..1].copy_from_slice(&i8::try_from(value).ok()?.to_ne_bytes()),
        Scalar::U16 => bytes[..2].copy_from_slice(&u16::try_from(value).ok()?.to_ne_bytes()),
        Scalar::I16 => bytes[..2].copy_from_slice(&i16::try_from(value).ok()?.to_ne_bytes()),
        Scalar::U32 => bytes[..4].copy_from_slice(&u32::try_from(value).ok()?.to_ne_bytes()),
        Scalar::I32 => bytes[..4].copy_from_slice(&i32::try_from(value).ok()?.to_ne_bytes()),
        Scalar::U64 => bytes[..8].copy_from_slice(&u64::try_from(value).ok()?.to_ne_bytes()),
        Scalar::I64 => bytes[..8].copy_from_slice(&i64::try_from(value).ok()?.to_ne_bytes()),
    }
    Some(())
}

fn lookup(layout: &'static StructLayout, name: &str) -> Result<&'static Field> {
    layout.field(name).ok_or_else(|| LayoutError::NoSuchField {
        layout: layout.name(),
        field: name.to_string(),
    })
}

/// Zeroed native storage for one structure
pub struct StructBuffer {
    layout: &'static StructLayout,
    words: Vec<u64>,
}

impl StructBuffer {
    pub fn zeroed(layout: &'static StructLayout) -> Self {
        Self {
            layout,
            words: vec![0; layout.size().div_ceil(8)],
        }
    }

    pub fn layout(&self) -> &'static StructLayout {
        self.layout
    }

    /// Pointer suitable for passing to the C call that fills the structure.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.words.as_mut_ptr().cast()
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.words.as_ptr().cast()
    }

    fn bytes(&self) -> &[u8] {
        // SAFETY: `words` holds at least `layout.size()` initialised bytes.
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.layout.size()) }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        let len = self.layout.size();
        // SAFETY: as above, and the borrow is unique.
        unsafe { std::slice::from_raw_parts_mut(self.as_mut_ptr(), len) }
    }

    /// Write an integer field of an input structure.
    pub fn set_int(&mut self, name: &str, value: i64) -> Result<()> {
        let layout = self.layout;
        let field = lookup(layout, name)?;
        let scalar = match field.kind {
            FieldKind::Int(s) => s,
            _ => {
                return Err(LayoutError::WrongKind {
                    layout: layout.name(),
                    field: field.name,
                    expected: "an integer",
                })
            }
        };
        let bytes = &mut self.bytes_mut()[field.offset..field.end()];
        write_scalar(bytes, scalar, value as i128).ok_or(LayoutError::OutOfRange {
            field: field.name,
            value: value as i128,
        })
    }

    /// Hand the zeroed buffer to `fill`. The contents become readable only
    /// when `fill` succeeds.
    pub fn populate<E>(mut self, fill: impl FnOnce(*mut u8) -> std::result::Result<(), E>) -> std::result::Result<Populated, E> {
        fill(self.as_mut_ptr())?;
        Ok(Populated { buf: self })
    }
}

/// A buffer filled by a successful native call
pub struct Populated {
    buf: StructBuffer,
}

impl Populated {
    /// Copy bytes captured elsewhere (another process, another platform).
    pub fn from_bytes(layout: &'static StructLayout, bytes: &[u8]) -> Result<Self> {
        if bytes.len() < layout.size() {
            return Err(LayoutError::BufferTooSmall {
                layout: layout.name(),
                required: layout.size(),
                actual: bytes.len(),
            });
        }
        let mut buf = StructBuffer::zeroed(layout);
        buf.bytes_mut().copy_from_slice(&bytes[..layout.size()]);
        Ok(Self { buf })
    }

    pub fn layout(&self) -> &'static StructLayout {
        self.buf.layout
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buf.bytes()
    }

    pub fn view(&self) -> View<'_> {
        View {
            layout: self.buf.layout,
            bytes: self.buf.bytes(),
        }
    }
}

/// Read-only window onto populated bytes
#[derive(Clone, Copy)]
pub struct View<'a> {
    layout: &'static StructLayout,
    bytes: &'a [u8],
}

impl<'a> View<'a> {
    pub fn layout(&self) -> &'static StructLayout {
        self.layout
    }

    fn scalar(&self, name: &str) -> Result<(&'static Field, i128)> {
        let field = lookup(self.layout, name)?;
        match field.kind {
            FieldKind::Int(s) | FieldKind::Ptr(s) => {
                Ok((field, read_scalar(&self.bytes[field.offset..field.end()], s)))
            }
            _ => Err(LayoutError::WrongKind {
                layout: self.layout.name(),
                field: field.name,
                expected: "a scalar",
            }),
        }
    }

    pub fn read_i64(&self, name: &str) -> Result<i64> {
        let (field, value) = self.scalar(name)?;
        i64::try_from(value).map_err(|_| LayoutError::OutOfRange {
            field: field.name,
            value,
        })
    }

    pub fn read_u64(&self, name: &str) -> Result<u64> {
        let (field, value) = self.scalar(name)?;
        u64::try_from(value).map_err(|_| LayoutError::OutOfRange {
            field: field.name,
            value,
        })
    }

    pub fn read_u32(&self, name: &str) -> Result<u32> {
        let (field, value) = self.scalar(name)?;
        u32::try_from(value).map_err(|_| LayoutError::OutOfRange {
            field: field.name,
            value,
        })
    }

    /// Address stored in a pointer field.
    pub fn read_ptr(&self, name: &str) -> Result<usize> {
        let field = lookup(self.layout, name)?;
        if !matches!(field.kind, FieldKind::Ptr(_)) {
            return Err(LayoutError::WrongKind {
                layout: self.layout.name(),
                field: field.name,
                expected: "a pointer",
            });
        }
        let (_, value) = self.scalar(name)?;
        usize::try_from(value).map_err(|_| LayoutError::OutOfRange {
            field: field.name,
            value,
        })
    }

    /// Raw bytes of an inline array field.
    pub fn read_bytes(&self, name: &str) -> Result<&'a [u8]> {
        let field = lookup(self.layout, name)?;
        match field.kind {
            FieldKind::Array(..) => Ok(&self.bytes[field.offset..field.end()]),
            _ => Err(LayoutError::WrongKind {
                layout: self.layout.name(),
                field: field.name,
                expected: "an array",
            }),
        }
    }

    pub fn nested(&self, name: &str) -> Result<View<'a>> {
        let field = lookup(self.layout, name)?;
        match field.kind {
            FieldKind::Nested(inner) => Ok(View {
                layout: inner,
                bytes: &self.bytes[field.offset..field.end()],
            }),
            _ => Err(LayoutError::WrongKind {
                layout: self.layout.name(),
                field: field.name,
                expected: "a nested struct",
            }),
        }
    }

    /// Timestamp stored either as a nested `{sec, nsec}` struct or as
    /// plain seconds.
    pub fn read_timestamp(&self, name: &str) -> Result<Timestamp> {
        let field = lookup(self.layout, name)?;
        match field.kind {
            FieldKind::Nested(_) => {
                let ts = self.nested(name)?;
                let sec = ts.read_i64("sec")?;
                let nsec = if ts.layout.has_field("nsec") {
                    ts.read_u32("nsec")?
                } else {
                    0
                };
                Ok(Timestamp::new(sec, nsec))
            }
            _ => Ok(Timestamp::from_secs(self.read_i64(name)?)),
        }
    }
}
