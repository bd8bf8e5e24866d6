//! A minimal stand-in for the real, external Variant value type (see the
//! crate's module docs). Attribute maps need *some* concrete value type to
//! compile and be exercised by tests; this is intentionally small and is
//! not a complete value system.

use std::fmt;

/// A single scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    /// UTF-8 text.
    String(String),
    /// Signed integer.
    Int(i64),
    /// Floating point.
    Double(f64),
    /// Boolean flag.
    Bool(bool),
    /// A 2D point, used by spatial object types.
    Point(f64, f64),
}

/// An attribute value: either a single [`Atom`] or a homogeneous array of
/// them.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    /// A scalar value.
    Atom(Atom),
    /// An array of scalar values.
    Array(Vec<Atom>),
}

impl Variant {
    /// Stringifies the variant for display and for the synthetic
    /// reserved-name accessors (`id`, `type`, `structure`, ...).
    pub fn display_string(&self) -> String {
        match self {
            Variant::Atom(atom) => atom.to_string(),
            Variant::Array(items) => {
                let parts: Vec<String> = items.iter().map(Atom::to_string).collect();
                format!("[{}]", parts.join(", "))
            }
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::String(s) => write!(f, "{s}"),
            Atom::Int(i) => write!(f, "{i}"),
            Atom::Double(d) => write!(f, "{d}"),
            Atom::Bool(b) => write!(f, "{b}"),
            Atom::Point(x, y) => write!(f, "({x}, {y})"),
        }
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::Atom(Atom::String(value.to_string()))
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Variant::Atom(Atom::String(value))
    }
}

impl From<i64> for Variant {
    fn from(value: i64) -> Self {
        Variant::Atom(Atom::Int(value))
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Variant::Atom(Atom::Double(value))
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Variant::Atom(Atom::Bool(value))
    }
}
