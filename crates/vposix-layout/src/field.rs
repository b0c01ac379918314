//! Field and struct layout model.
//!
//! Layouts are declared with [`struct_layout!`](crate::struct_layout) as an
//! ordered field list. Offsets, alignment and total size are computed in a
//! `const` context from the ABI, the same way a C compiler lays out the
//! structure, so every table is fixed at compile time.

use std::fmt;

use crate::platform::AddrWidth;

/// C data model used when laying out fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Abi {
    pub width: AddrWidth,
    /// Alignment of 8-byte integers (4 on i386, 8 on LP64)
    pub int64_align: usize,
}

impl Abi {
    pub const LP64: Abi = Abi {
        width: AddrWidth::Bits64,
        int64_align: 8,
    };

    pub const ILP32: Abi = Abi {
        width: AddrWidth::Bits32,
        int64_align: 4,
    };
}

/// Fixed-width integer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
}

impl Scalar {
    pub const fn width(self) -> usize {
        match self {
            Scalar::U8 | Scalar::I8 => 1,
            Scalar::U16 | Scalar::I16 => 2,
            Scalar::U32 | Scalar::I32 => 4,
            Scalar::U64 | Scalar::I64 => 8,
        }
    }

    pub const fn is_signed(self) -> bool {
        matches!(self, Scalar::I8 | Scalar::I16 | Scalar::I32 | Scalar::I64)
    }

    const fn align(self, abi: Abi) -> usize {
        match self.width() {
            8 => abi.int64_align,
            w => w,
        }
    }

    const fn unsigned_for(width: AddrWidth) -> Scalar {
        match width {
            AddrWidth::Bits32 => Scalar::U32,
            AddrWidth::Bits64 => Scalar::U64,
        }
    }

    const fn signed_for(width: AddrWidth) -> Scalar {
        match width {
            AddrWidth::Bits32 => Scalar::I32,
            AddrWidth::Bits64 => Scalar::I64,
        }
    }

    pub fn c_name(self) -> &'static str {
        match self {
            Scalar::U8 => "u8",
            Scalar::I8 => "i8",
            Scalar::U16 => "u16",
            Scalar::I16 => "i16",
            Scalar::U32 => "u32",
            Scalar::I32 => "i32",
            Scalar::U64 => "u64",
            Scalar::I64 => "i64",
        }
    }
}

/// Declared type of a field, before ABI resolution
#[derive(Debug, Clone, Copy)]
pub enum FieldType {
    Int(Scalar),
    /// C `long`
    Long,
    /// C `unsigned long`
    ULong,
    /// Data pointer
    Ptr,
    /// Reserved words, padding, or inline char arrays
    Array(Scalar, usize),
    Nested(&'static StructLayout),
}

impl FieldType {
    const fn resolve(self, abi: Abi) -> FieldKind {
        match self {
            FieldType::Int(s) => FieldKind::Int(s),
            FieldType::Long => FieldKind::Int(Scalar::signed_for(abi.width)),
            FieldType::ULong => FieldKind::Int(Scalar::unsigned_for(abi.width)),
            FieldType::Ptr => FieldKind::Ptr(Scalar::unsigned_for(abi.width)),
            FieldType::Array(s, n) => FieldKind::Array(s, n),
            FieldType::Nested(l) => FieldKind::Nested(l),
        }
    }
}

/// ABI-resolved field type
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Int(Scalar),
    Ptr(Scalar),
    Array(Scalar, usize),
    Nested(&'static StructLayout),
}

impl FieldKind {
    pub const fn size(&self) -> usize {
        match self {
            FieldKind::Int(s) | FieldKind::Ptr(s) => s.width(),
            FieldKind::Array(s, n) => s.width() * *n,
            FieldKind::Nested(l) => l.size,
        }
    }

    const fn align(&self, abi: Abi) -> usize {
        match self {
            FieldKind::Int(s) | FieldKind::Ptr(s) | FieldKind::Array(s, _) => s.align(abi),
            FieldKind::Nested(l) => l.align,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Int(s) => f.write_str(s.c_name()),
            FieldKind::Ptr(s) => write!(f, "ptr{}", s.width() * 8),
            FieldKind::Array(s, n) => write!(f, "[{}; {}]", s.c_name(), n),
            FieldKind::Nested(l) => write!(f, "struct {}", l.name),
        }
    }
}

/// One field of a structure with its resolved byte offset
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub offset: usize,
    pub align: usize,
    pub kind: FieldKind,
}

impl Field {
    const PLACEHOLDER: Field = Field {
        name: "",
        offset: 0,
        align: 1,
        kind: FieldKind::Array(Scalar::U8, 0),
    };

    pub const fn size(&self) -> usize {
        self.kind.size()
    }

    pub const fn end(&self) -> usize {
        self.offset + self.kind.size()
    }

    /// Padding and reserved fields are named with a leading `__`.
    pub fn is_reserved(&self) -> bool {
        self.name.starts_with("__")
    }
}

const fn align_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

/// Lay out declared fields in order, inserting natural padding.
pub const fn resolve<const N: usize>(abi: Abi, decls: [(&'static str, FieldType); N]) -> [Field; N] {
    let mut out = [Field::PLACEHOLDER; N];
    let mut cursor = 0;
    let mut i = 0;
    while i < N {
        let (name, ty) = decls[i];
        let kind = ty.resolve(abi);
        let align = kind.align(abi);
        cursor = align_up(cursor, align);
        out[i] = Field {
            name,
            offset: cursor,
            align,
            kind,
        };
        cursor += kind.size();
        i += 1;
    }
    out
}

/// Byte-level description of one native structure for one ABI
#[derive(Debug, Clone, Copy)]
pub struct StructLayout {
    name: &'static str,
    abi: Abi,
    fields: &'static [Field],
    size: usize,
    align: usize,
}

impl StructLayout {
    pub const fn new(name: &'static str, abi: Abi, fields: &'static [Field]) -> Self {
        let mut align = 1;
        let mut end = 0;
        let mut i = 0;
        while i < fields.len() {
            if fields[i].align > align {
                align = fields[i].align;
            }
            if fields[i].end() > end {
                end = fields[i].end();
            }
            i += 1;
        }
        Self {
            name,
            abi,
            fields,
            size: align_up(end, align),
            align,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn abi(&self) -> Abi {
        self.abi
    }

    /// Total size in bytes, including trailing padding
    pub const fn size(&self) -> usize {
        self.size
    }

    pub const fn align(&self) -> usize {
        self.align
    }

    pub fn fields(&self) -> &'static [Field] {
        self.fields
    }

    pub fn field(&self, name: &str) -> Option<&'static Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }
}

impl fmt::Display for StructLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "struct {} ({}-bit, {} bytes, align {})",
            self.name,
            self.abi.width.bits(),
            self.size,
            self.align
        )?;
        for field in self.fields {
            writeln!(
                f,
                "  {:>4}  {:>3}  {:<12} {}",
                field.offset,
                field.size(),
                field.name,
                field.kind
            )?;
        }
        Ok(())
    }
}

/// Declare a [`StructLayout`] constant.
///
/// ```ignore
/// struct_layout! {
///     pub const UTIMBUF_64 @ Abi::LP64 => "utimbuf" {
///         actime: long,
///         modtime: long,
///     }
/// }
/// ```
///
/// Field types: `u8`..`i64`, `long`, `ulong`, `ptr`, `[scalar; N]`, and
/// `{OTHER_LAYOUT}` for nested structures.
#[macro_export]
macro_rules! struct_layout {
    ($(#[$attr:meta])* $vis:vis const $id:ident @ $abi:expr => $cname:literal {
        $($field:ident : $ty:tt),* $(,)?
    }) => {
        $(#[$attr])*
        $vis const $id: $crate::StructLayout = {
            const FIELDS: &[$crate::Field] = &$crate::field::resolve(
                $abi,
                [$((stringify!($field), $crate::field_ty!($ty))),*],
            );
            $crate::StructLayout::new($cname, $abi, FIELDS)
        };
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! field_ty {
    (@scalar u8) => { $crate::Scalar::U8 };
    (@scalar i8) => { $crate::Scalar::I8 };
    (@scalar u16) => { $crate::Scalar::U16 };
    (@scalar i16) => { $crate::Scalar::I16 };
    (@scalar u32) => { $crate::Scalar::U32 };
    (@scalar i32) => { $crate::Scalar::I32 };
    (@scalar u64) => { $crate::Scalar::U64 };
    (@scalar i64) => { $crate::Scalar::I64 };
    (long) => { $crate::FieldType::Long };
    (ulong) => { $crate::FieldType::ULong };
    (ptr) => { $crate::FieldType::Ptr };
    ([$s:ident; $n:expr]) => { $crate::FieldType::Array($crate::field_ty!(@scalar $s), $n) };
    ({$nested:path}) => { $crate::FieldType::Nested(&$nested) };
    ($s:ident) => { $crate::FieldType::Int($crate::field_ty!(@scalar $s)) };
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::struct_layout! {
        const PAIR_64 @ Abi::LP64 => "pair" {
            a: u8,
            b: u64,
        }
    }

    crate::struct_layout! {
        const PAIR_32 @ Abi::ILP32 => "pair" {
            a: u8,
            b: u64,
        }
    }

    crate::struct_layout! {
        const OUTER @ Abi::LP64 => "outer" {
            tag: u16,
            inner: {PAIR_64},
            p: ptr,
            l: long,
            tail: [u8; 3],
        }
    }

    #[test]
    fn test_natural_padding_lp64() {
        assert_eq!(PAIR_64.field("b").unwrap().offset, 8);
        assert_eq!(PAIR_64.size(), 16);
        assert_eq!(PAIR_64.align(), 8);
    }

    #[test]
    fn test_i386_int64_alignment() {
        assert_eq!(PAIR_32.field("b").unwrap().offset, 4);
        assert_eq!(PAIR_32.size(), 12);
        assert_eq!(PAIR_32.align(), 4);
    }

    #[test]
    fn test_nested_and_trailing_padding() {
        assert_eq!(OUTER.field("inner").unwrap().offset, 8);
        assert_eq!(OUTER.field("p").unwrap().offset, 24);
        assert_eq!(OUTER.field("l").unwrap().offset, 32);
        assert_eq!(OUTER.field("tail").unwrap().offset, 40);
        // 43 rounded up to the 8-byte struct alignment
        assert_eq!(OUTER.size(), 48);
        assert!(matches!(OUTER.field("p").unwrap().kind, FieldKind::Ptr(Scalar::U64)));
        assert!(matches!(OUTER.field("l").unwrap().kind, FieldKind::Int(Scalar::I64)));
    }

    #[test]
    fn test_missing_field() {
        assert!(OUTER.field("nope").is_none());
        assert!(OUTER.has_field("tag"));
    }

    #[test]
    fn test_display_lists_fields() {
        let text = OUTER.to_string();
        assert!(text.starts_with("struct outer (64-bit, 48 bytes"));
        assert!(text.contains("struct pair"));
        assert!(text.contains("[u8; 3]"));
    }
}
