use crate::Quicklist;

/// Kind tag for stored values.
///
/// Only `Str` and `List` are producible today; the other tags are reserved
/// so type checks can name every Redis kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Str,
    List,
    Set,
    ZSet,
    Hash,
}

/// A stored value. The payload shape and the kind tag cannot disagree.
#[derive(Debug)]
pub enum Value {
    Str(Vec<u8>),
    List(Quicklist),
}

impl Value {
    #[inline]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Value::Str(_) => ValueKind::Str,
            Value::List(_) => ValueKind::List,
        }
    }
}
