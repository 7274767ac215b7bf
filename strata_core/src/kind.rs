//! Java value kinds.
//!
//! A kind is the machine-level shape of a value as the VM sees it: its
//! width, its stack representation, and whether it is a managed reference.

use std::fmt;

/// The kind of a Java value or memory slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum JavaKind {
    /// `boolean`, stored as one byte.
    Boolean,
    /// `byte`.
    Byte,
    /// `short`.
    Short,
    /// `char`, unsigned 16 bits.
    Char,
    /// `int`.
    Int,
    /// `long`.
    Long,
    /// `float`.
    Float,
    /// `double`.
    Double,
    /// Managed reference.
    Object,
    /// `void` (call results only).
    Void,
    /// Raw machine word (metadata pointers, addresses).
    Word,
}

impl JavaKind {
    /// Every kind that can be stored in an array.
    pub const ARRAY_ELEMENT_KINDS: [JavaKind; 9] = [
        JavaKind::Boolean,
        JavaKind::Byte,
        JavaKind::Short,
        JavaKind::Char,
        JavaKind::Int,
        JavaKind::Long,
        JavaKind::Float,
        JavaKind::Double,
        JavaKind::Object,
    ];

    /// Whether values of this kind are managed references.
    #[inline]
    pub const fn is_object(self) -> bool {
        matches!(self, JavaKind::Object)
    }

    /// Whether this is an integral kind narrower than or equal to `int`.
    #[inline]
    pub const fn is_sub_word_or_int(self) -> bool {
        matches!(
            self,
            JavaKind::Boolean | JavaKind::Byte | JavaKind::Short | JavaKind::Char | JavaKind::Int
        )
    }

    /// Whether this kind is numerically signed.
    #[inline]
    pub const fn is_signed(self) -> bool {
        !matches!(self, JavaKind::Boolean | JavaKind::Char)
    }

    /// The kind used for this value on the operand stack.
    ///
    /// Sub-word integers widen to `int`.
    #[inline]
    pub const fn stack_kind(self) -> JavaKind {
        match self {
            JavaKind::Boolean | JavaKind::Byte | JavaKind::Short | JavaKind::Char => JavaKind::Int,
            other => other,
        }
    }

    /// Number of interpreter local slots this kind occupies.
    #[inline]
    pub const fn stack_slots(self) -> u32 {
        match self {
            JavaKind::Long | JavaKind::Double => 2,
            JavaKind::Void => 0,
            _ => 1,
        }
    }

    /// Width in bits of the in-memory representation, given the word width.
    ///
    /// References are reported at full word width; compression is a
    /// configuration concern handled by the caller.
    #[inline]
    pub const fn bits(self, word_bits: u8) -> u8 {
        match self {
            JavaKind::Boolean | JavaKind::Byte => 8,
            JavaKind::Short | JavaKind::Char => 16,
            JavaKind::Int | JavaKind::Float => 32,
            JavaKind::Long | JavaKind::Double => 64,
            JavaKind::Object | JavaKind::Word => word_bits,
            JavaKind::Void => 0,
        }
    }

    /// Size in bytes of the in-memory representation.
    #[inline]
    pub const fn byte_size(self, word_size: u32) -> u32 {
        match self {
            JavaKind::Object | JavaKind::Word => word_size,
            other => other.bits(0) as u32 / 8,
        }
    }

    /// Single-character type descriptor.
    pub const fn type_char(self) -> char {
        match self {
            JavaKind::Boolean => 'Z',
            JavaKind::Byte => 'B',
            JavaKind::Short => 'S',
            JavaKind::Char => 'C',
            JavaKind::Int => 'I',
            JavaKind::Long => 'J',
            JavaKind::Float => 'F',
            JavaKind::Double => 'D',
            JavaKind::Object => 'A',
            JavaKind::Void => 'V',
            JavaKind::Word => 'W',
        }
    }

    /// Human-readable name.
    pub const fn as_str(self) -> &'static str {
        match self {
            JavaKind::Boolean => "boolean",
            JavaKind::Byte => "byte",
            JavaKind::Short => "short",
            JavaKind::Char => "char",
            JavaKind::Int => "int",
            JavaKind::Long => "long",
            JavaKind::Float => "float",
            JavaKind::Double => "double",
            JavaKind::Object => "Object",
            JavaKind::Void => "void",
            JavaKind::Word => "word",
        }
    }
}

impl fmt::Display for JavaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_kind_widens_sub_words() {
        assert_eq!(JavaKind::Byte.stack_kind(), JavaKind::Int);
        assert_eq!(JavaKind::Char.stack_kind(), JavaKind::Int);
        assert_eq!(JavaKind::Long.stack_kind(), JavaKind::Long);
        assert_eq!(JavaKind::Object.stack_kind(), JavaKind::Object);
    }

    #[test]
    fn test_stack_slots() {
        assert_eq!(JavaKind::Int.stack_slots(), 1);
        assert_eq!(JavaKind::Long.stack_slots(), 2);
        assert_eq!(JavaKind::Double.stack_slots(), 2);
        assert_eq!(JavaKind::Object.stack_slots(), 1);
    }

    #[test]
    fn test_byte_size() {
        assert_eq!(JavaKind::Boolean.byte_size(8), 1);
        assert_eq!(JavaKind::Char.byte_size(8), 2);
        assert_eq!(JavaKind::Float.byte_size(8), 4);
        assert_eq!(JavaKind::Double.byte_size(8), 8);
        assert_eq!(JavaKind::Object.byte_size(8), 8);
        assert_eq!(JavaKind::Object.byte_size(4), 4);
    }

    #[test]
    fn test_signedness() {
        assert!(JavaKind::Byte.is_signed());
        assert!(!JavaKind::Char.is_signed());
        assert!(!JavaKind::Boolean.is_signed());
    }
}
