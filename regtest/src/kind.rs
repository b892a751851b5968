//! Closed set of element kinds and their compatibility table.

use std::fmt;

/// Element kind of a column or array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Bool,
    Int,
    UInt,
    Float,
    Complex,
    Text,
    DateTime,
    TimeDelta,
    Bytes,
    Object,
    Raw,
}

/// Kind families used by the compatibility table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Numeric,
    Textual,
    Other,
}

impl Kind {
    /// Label shown in type-mismatch reports.
    pub fn label(self) -> &'static str {
        match self {
            Kind::Bool => "bool",
            Kind::Int => "int64",
            Kind::UInt => "uint64",
            Kind::Float => "float64",
            Kind::Complex => "complex128",
            Kind::Text => "str",
            Kind::DateTime => "datetime64",
            Kind::TimeDelta => "timedelta64",
            Kind::Bytes => "bytes",
            Kind::Object => "object",
            Kind::Raw => "void",
        }
    }

    pub fn family(self) -> Family {
        match self {
            Kind::Int | Kind::UInt | Kind::Float | Kind::Complex => Family::Numeric,
            Kind::Text => Family::Textual,
            _ => Family::Other,
        }
    }

    /// Floating kinds are compared with a tolerance, everything else exactly.
    pub fn is_inexact(self) -> bool {
        matches!(self, Kind::Float | Kind::Complex)
    }

    pub fn is_numeric(self) -> bool {
        self.family() == Family::Numeric
    }

    /// Equal kinds are compatible, and so are two kinds of the numeric or the
    /// textual family.
    pub fn is_compatible(self, other: Kind) -> bool {
        if self == other {
            return true;
        }
        match (self.family(), other.family()) {
            (Family::Numeric, Family::Numeric) | (Family::Textual, Family::Textual) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Format a shape the way reports print it: `(3,)`, `(2, 2)`, `()`.
pub fn format_shape(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [single] => format!("({single},)"),
        _ => {
            let joined = shape
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!("({joined})")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compatibility_table() {
        assert!(Kind::Int.is_compatible(Kind::Float));
        assert!(Kind::UInt.is_compatible(Kind::Complex));
        assert!(Kind::Text.is_compatible(Kind::Text));
        assert!(!Kind::Bool.is_compatible(Kind::Int));
        assert!(!Kind::Text.is_compatible(Kind::Float));
        assert!(!Kind::DateTime.is_compatible(Kind::Int));
    }

    #[test]
    fn shape_formatting() {
        assert_eq!(format_shape(&[]), "()");
        assert_eq!(format_shape(&[3]), "(3,)");
        assert_eq!(format_shape(&[2, 3]), "(2, 3)");
    }
}
