//! Value and key types.

use lute_ir::NodeRef;
use std::fmt;

/// Generation-checked index into one of the heap's stores.
///
/// The generation is bumped every time a slot is reused, so a stale
/// handle (an engine bug) is caught at dereference instead of silently
/// aliasing an unrelated object.
macro_rules! handle_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Copy, Clone, Eq, PartialEq, Hash)]
        pub struct $name {
            index: u32,
            gen: u32,
        }

        impl $name {
            #[inline]
            pub const fn new(index: u32, gen: u32) -> Self {
                $name { index, gen }
            }

            /// Slot index in the owning store.
            #[inline]
            pub const fn index(self) -> usize {
                self.index as usize
            }

            /// Generation the slot had when this handle was issued.
            #[inline]
            pub const fn generation(self) -> u32 {
                self.gen
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({}g{})"), self.index, self.gen)
            }
        }
    };
}

handle_type! {
    /// Handle to an immutable byte string.
    StrRef
}
handle_type! {
    /// Handle to a mutable table.
    TableRef
}
handle_type! {
    /// Handle to a permanent compiled-code buffer.
    CodeRef
}

/// A closure: a permanent code buffer plus the entry cell of the function
/// literal inside it. No rebasing happens at closure creation; the entry
/// simply reinterprets where evaluation starts.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct FuncValue {
    pub code: CodeRef,
    pub entry: NodeRef,
}

/// A dynamic value.
///
/// `Copy`: heap kinds are handles, scalars are inline. The derived
/// `PartialEq` compares handles by *identity*; language-level equality
/// (string content, numeric promotion) is `Heap::value_eq`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Value {
    /// The "no value" sentinel: result of runtime errors, absent table
    /// keys, and functions that return nothing.
    Null,
    Int(i64),
    /// Never integral: see [`Value::real`].
    Real(f64),
    Str(StrRef),
    Func(FuncValue),
    Table(TableRef),
}

impl Value {
    /// Canonicalizing real constructor: a real exactly representable as
    /// an `i64` is stored as an integer.
    pub fn real(v: f64) -> Value {
        let as_int = v as i64;
        if (as_int as f64) == v {
            Value::Int(as_int)
        } else {
            Value::Real(v)
        }
    }

    /// Numeric view, if this is a number.
    pub fn as_real(self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(v as f64),
            Value::Real(v) => Some(v),
            _ => None,
        }
    }

    /// Truthiness: `Null` and integer zero are false, everything else is
    /// true. (Real zero cannot exist; it canonicalizes to `Int(0)`.)
    pub fn is_truthy(self) -> bool {
        !matches!(self, Value::Null | Value::Int(0))
    }

    /// Type name for diagnostics.
    pub fn type_name(self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Real(_) => "real",
            Value::Str(_) => "string",
            Value::Func(_) => "function",
            Value::Table(_) => "table",
        }
    }
}

/// A table key as stored: integer, non-integral real (by bit pattern,
/// safe because canonicalization leaves no integral reals), or string
/// handle. String keys compare by content, so `Key` itself is not `Eq`;
/// comparison goes through the resolved [`KeyView`].
#[derive(Copy, Clone, Debug)]
pub enum Key {
    Int(i64),
    /// Bit pattern of a non-integral, non-NaN real.
    Real(u64),
    Str(StrRef),
}

impl Key {
    /// Classify a value as a key, if it is a legal key kind.
    ///
    /// Integral reals have already canonicalized to `Int`, so integers
    /// and reals whose values coincide produce the same key.
    pub fn from_value(value: Value) -> Option<Key> {
        match value {
            Value::Int(v) => Some(Key::Int(v)),
            Value::Real(v) if !v.is_nan() => Some(Key::Real(v.to_bits())),
            Value::Str(s) => Some(Key::Str(s)),
            _ => None,
        }
    }

    /// The key as a value again (for `for-in` loop variables).
    pub fn to_value(self) -> Value {
        match self {
            Key::Int(v) => Value::Int(v),
            Key::Real(bits) => Value::Real(f64::from_bits(bits)),
            Key::Str(s) => Value::Str(s),
        }
    }
}

/// A key with string content resolved, used for hashing and equality.
/// Two distinct `StrRef`s with the same bytes are the same key.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum KeyView<'a> {
    Int(i64),
    Real(u64),
    Str(&'a [u8]),
}
