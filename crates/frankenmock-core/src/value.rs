//! The value capsule.
//!
//! Every stored return value, output parameter and checker operand travels as a
//! [`Value`]. Producers convert through [`IntoValue`], consumers through
//! [`FromValue`]; both carry a static type label so a producer/consumer width
//! mismatch (say `i32` registered, `i64` consumed) fails loudly instead of
//! silently reinterpreting bits.

use std::ffi::c_void;
use std::fmt;

/// Tagged scalar exchanged between stores, shims and checkers.
#[derive(Debug, Clone, Copy)]
pub enum Value {
    Signed(i64),
    Unsigned(u64),
    Float(f32),
    Double(f64),
    /// Opaque address. Never dereferenced by the engine.
    Pointer(*const c_void),
}

/// Discriminant of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Signed,
    Unsigned,
    Float,
    Double,
    Pointer,
}

impl Value {
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Signed(_) => ValueKind::Signed,
            Self::Unsigned(_) => ValueKind::Unsigned,
            Self::Float(_) => ValueKind::Float,
            Self::Double(_) => ValueKind::Double,
            Self::Pointer(_) => ValueKind::Pointer,
        }
    }

    /// Integer view spanning both signed and unsigned 64-bit domains.
    #[must_use]
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Self::Signed(v) => Some(i128::from(v)),
            Self::Unsigned(v) => Some(i128::from(v)),
            _ => None,
        }
    }

    /// Floating point view; `Float` is widened losslessly.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Float(v) => Some(f64::from(v)),
            Self::Double(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_pointer(&self) -> Option<*const c_void> {
        match *self {
            Self::Pointer(p) => Some(p),
            _ => None,
        }
    }

    /// Bit-for-bit identity: same variant and same underlying bits.
    #[must_use]
    pub fn bit_eq(&self, other: &Self) -> bool {
        match (*self, *other) {
            (Self::Signed(a), Self::Signed(b)) => a == b,
            (Self::Unsigned(a), Self::Unsigned(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            (Self::Pointer(a), Self::Pointer(b)) => std::ptr::eq(a, b),
            _ => false,
        }
    }
}

/// Equality on capsules is bit identity; see [`Value::bit_eq`].
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.bit_eq(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signed(v) => write!(f, "{v}"),
            Self::Unsigned(v) => write!(f, "{v} ({v:#x})"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Pointer(p) => write!(f, "{p:p}"),
        }
    }
}

/// Conversion of a Rust value into a capsule, tagged with its type label.
pub trait IntoValue {
    fn type_label() -> &'static str;
    fn into_value(self) -> Value;
}

/// Conversion out of a capsule. Returns `None` when the capsule cannot
/// represent `Self` (wrong variant or out-of-range integer).
pub trait FromValue: Sized {
    fn type_label() -> &'static str;
    fn from_value(value: Value) -> Option<Self>;
}

impl IntoValue for Value {
    fn type_label() -> &'static str {
        "value"
    }

    fn into_value(self) -> Value {
        self
    }
}

impl FromValue for Value {
    fn type_label() -> &'static str {
        "value"
    }

    fn from_value(value: Value) -> Option<Self> {
        Some(value)
    }
}

macro_rules! signed_value {
    ($($ty:ty),* $(,)?) => {$(
        impl IntoValue for $ty {
            fn type_label() -> &'static str {
                stringify!($ty)
            }

            fn into_value(self) -> Value {
                Value::Signed(self as i64)
            }
        }

        impl FromValue for $ty {
            fn type_label() -> &'static str {
                stringify!($ty)
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::Signed(v) => <$ty>::try_from(v).ok(),
                    Value::Unsigned(v) => <$ty>::try_from(v).ok(),
                    _ => None,
                }
            }
        }
    )*};
}

macro_rules! unsigned_value {
    ($($ty:ty),* $(,)?) => {$(
        impl IntoValue for $ty {
            fn type_label() -> &'static str {
                stringify!($ty)
            }

            fn into_value(self) -> Value {
                Value::Unsigned(self as u64)
            }
        }

        impl FromValue for $ty {
            fn type_label() -> &'static str {
                stringify!($ty)
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::Unsigned(v) => <$ty>::try_from(v).ok(),
                    Value::Signed(v) => <$ty>::try_from(v).ok(),
                    _ => None,
                }
            }
        }
    )*};
}

signed_value!(i8, i16, i32, i64, isize);
unsigned_value!(u8, u16, u32, u64, usize);

impl IntoValue for bool {
    fn type_label() -> &'static str {
        "bool"
    }

    fn into_value(self) -> Value {
        Value::Unsigned(u64::from(self))
    }
}

impl FromValue for bool {
    fn type_label() -> &'static str {
        "bool"
    }

    fn from_value(value: Value) -> Option<Self> {
        match value.as_i128()? {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        }
    }
}

impl IntoValue for f32 {
    fn type_label() -> &'static str {
        "f32"
    }

    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl FromValue for f32 {
    fn type_label() -> &'static str {
        "f32"
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(v),
            _ => None,
        }
    }
}

impl IntoValue for f64 {
    fn type_label() -> &'static str {
        "f64"
    }

    fn into_value(self) -> Value {
        Value::Double(self)
    }
}

impl FromValue for f64 {
    fn type_label() -> &'static str {
        "f64"
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_f64()
    }
}

impl<T> IntoValue for *const T {
    fn type_label() -> &'static str {
        std::any::type_name::<*const T>()
    }

    fn into_value(self) -> Value {
        Value::Pointer(self.cast())
    }
}

impl<T> FromValue for *const T {
    fn type_label() -> &'static str {
        std::any::type_name::<*const T>()
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_pointer().map(|p| p.cast::<T>())
    }
}

impl<T> IntoValue for *mut T {
    fn type_label() -> &'static str {
        std::any::type_name::<*mut T>()
    }

    fn into_value(self) -> Value {
        Value::Pointer(self.cast_const().cast())
    }
}

impl<T> FromValue for *mut T {
    fn type_label() -> &'static str {
        std::any::type_name::<*mut T>()
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_pointer().map(|p| p.cast::<T>().cast_mut())
    }
}
