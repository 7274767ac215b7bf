//! Stamps: the static type facts attached to every value.

use strata_core::JavaKind;

use super::meta::TypeRef;

/// What is known about an object reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ObjectStamp {
    /// Static type, if known.
    pub ty: Option<TypeRef>,
    /// `ty` is the exact dynamic type.
    pub exact: bool,
    /// Never null.
    pub non_null: bool,
    /// Always null.
    pub always_null: bool,
}

impl ObjectStamp {
    /// A possibly-null reference of unknown type.
    pub const fn unknown() -> Self {
        Self {
            ty: None,
            exact: false,
            non_null: false,
            always_null: false,
        }
    }

    /// A non-null reference whose exact type is `ty`.
    pub const fn exact_non_null(ty: TypeRef) -> Self {
        Self {
            ty: Some(ty),
            exact: true,
            non_null: true,
            always_null: false,
        }
    }

    /// The null constant.
    pub const fn null() -> Self {
        Self {
            ty: None,
            exact: false,
            non_null: false,
            always_null: true,
        }
    }

    /// Same facts, but known non-null.
    pub const fn as_non_null(mut self) -> Self {
        self.non_null = true;
        self
    }
}

/// Static facts about a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stamp {
    /// No value (control and state nodes).
    Void,
    /// Integer with `bits` width and an inclusive range.
    Integer {
        /// Width in bits.
        bits: u8,
        /// Inclusive lower bound.
        lower: i64,
        /// Inclusive upper bound.
        upper: i64,
    },
    /// IEEE float of `bits` width.
    Float {
        /// Width in bits.
        bits: u8,
    },
    /// Boolean condition.
    Condition,
    /// Full-width object reference.
    Object(ObjectStamp),
    /// Compressed object reference.
    NarrowOop(ObjectStamp),
    /// Compressed class-metadata pointer.
    NarrowKlass,
    /// Raw machine word (full class-metadata and method pointers).
    Word,
}

impl Stamp {
    /// Full-range integer of `bits` width.
    pub const fn int(bits: u8) -> Self {
        let (lower, upper) = match bits {
            1 => (0, 1),
            8 => (i8::MIN as i64, i8::MAX as i64),
            16 => (i16::MIN as i64, i16::MAX as i64),
            32 => (i32::MIN as i64, i32::MAX as i64),
            _ => (i64::MIN, i64::MAX),
        };
        Stamp::Integer { bits, lower, upper }
    }

    /// Non-negative 32-bit integer (array lengths).
    pub const fn positive_int() -> Self {
        Stamp::Integer {
            bits: 32,
            lower: 0,
            upper: i32::MAX as i64,
        }
    }

    /// Single-value integer stamp.
    pub const fn int_constant(bits: u8, value: i64) -> Self {
        Stamp::Integer {
            bits,
            lower: value,
            upper: value,
        }
    }

    /// Possibly-null reference of unknown type.
    pub const fn object() -> Self {
        Stamp::Object(ObjectStamp::unknown())
    }

    /// Default stamp for a value of `kind` at its stack width.
    pub const fn for_kind(kind: JavaKind) -> Self {
        match kind {
            JavaKind::Boolean
            | JavaKind::Byte
            | JavaKind::Short
            | JavaKind::Char
            | JavaKind::Int => Stamp::int(32),
            JavaKind::Long => Stamp::int(64),
            JavaKind::Float => Stamp::Float { bits: 32 },
            JavaKind::Double => Stamp::Float { bits: 64 },
            JavaKind::Object => Stamp::object(),
            JavaKind::Word => Stamp::Word,
            JavaKind::Void => Stamp::Void,
        }
    }

    /// Stamp of the raw memory value of `kind`, before any implicit widening.
    pub const fn for_memory_kind(kind: JavaKind) -> Self {
        match kind {
            JavaKind::Boolean => Stamp::Integer {
                bits: 8,
                lower: 0,
                upper: 1,
            },
            JavaKind::Byte => Stamp::int(8),
            JavaKind::Short => Stamp::int(16),
            JavaKind::Char => Stamp::Integer {
                bits: 16,
                lower: 0,
                upper: u16::MAX as i64,
            },
            _ => Stamp::for_kind(kind),
        }
    }

    /// The stack kind of values with this stamp.
    pub const fn java_kind(&self) -> JavaKind {
        match self {
            Stamp::Void => JavaKind::Void,
            Stamp::Integer { bits, .. } if *bits > 32 => JavaKind::Long,
            Stamp::Integer { .. } => JavaKind::Int,
            Stamp::Condition => JavaKind::Boolean,
            Stamp::Float { bits: 32 } => JavaKind::Float,
            Stamp::Float { .. } => JavaKind::Double,
            Stamp::Object(_) | Stamp::NarrowOop(_) => JavaKind::Object,
            Stamp::NarrowKlass | Stamp::Word => JavaKind::Word,
        }
    }

    /// Object facts, for full or compressed references.
    pub const fn object_stamp(&self) -> Option<ObjectStamp> {
        match self {
            Stamp::Object(s) | Stamp::NarrowOop(s) => Some(*s),
            _ => None,
        }
    }

    /// Whether the value is a reference that is never null.
    pub const fn is_non_null(&self) -> bool {
        match self.object_stamp() {
            Some(s) => s.non_null,
            None => false,
        }
    }

    /// Whether the value is a reference that is always null.
    pub const fn is_always_null(&self) -> bool {
        match self.object_stamp() {
            Some(s) => s.always_null,
            None => false,
        }
    }

    /// Integer bounds, if this is an integer stamp.
    pub const fn int_range(&self) -> Option<(i64, i64)> {
        match self {
            Stamp::Integer { lower, upper, .. } => Some((*lower, *upper)),
            _ => None,
        }
    }

    /// Integer width, if this is an integer stamp.
    pub const fn int_bits(&self) -> Option<u8> {
        match self {
            Stamp::Integer { bits, .. } => Some(*bits),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_kinds() {
        assert_eq!(Stamp::for_kind(JavaKind::Byte).java_kind(), JavaKind::Int);
        assert_eq!(Stamp::for_kind(JavaKind::Long).java_kind(), JavaKind::Long);
        assert_eq!(Stamp::NarrowOop(ObjectStamp::unknown()).java_kind(), JavaKind::Object);
        assert_eq!(Stamp::NarrowKlass.java_kind(), JavaKind::Word);
    }

    #[test]
    fn test_memory_stamps_are_narrow() {
        assert_eq!(Stamp::for_memory_kind(JavaKind::Byte).int_bits(), Some(8));
        assert_eq!(Stamp::for_memory_kind(JavaKind::Char).int_range(), Some((0, 65535)));
        assert_eq!(Stamp::for_memory_kind(JavaKind::Int).int_bits(), Some(32));
    }

    #[test]
    fn test_nullness() {
        assert!(Stamp::Object(ObjectStamp::null()).is_always_null());
        assert!(Stamp::Object(ObjectStamp::exact_non_null(TypeRef(0))).is_non_null());
        assert!(!Stamp::object().is_non_null());
        assert!(!Stamp::int(32).is_non_null());
    }
}
