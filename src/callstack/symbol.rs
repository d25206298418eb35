//! Opaque function identifiers.

use crate::oracle::StateValue;
use crate::utils::error::NodeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Function identifier carried by call tree nodes
///
/// Numeric symbols are addresses left for an external resolver; name symbols
/// are already human-readable. Variants never compare equal to each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Symbol {
    Int(i32),
    Long(i64),
    Name(String),
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Int(address) => write!(f, "0x{:x}", address),
            Symbol::Long(address) => write!(f, "0x{:x}", address),
            Symbol::Name(name) => f.write_str(name),
        }
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Symbol::Name(name.to_string())
    }
}

impl TryFrom<&StateValue> for Symbol {
    type Error = NodeError;

    /// Decode a call stack value; anything but int, long or string is rejected
    fn try_from(value: &StateValue) -> Result<Self, Self::Error> {
        match value {
            StateValue::Int(v) => Ok(Symbol::Int(*v)),
            StateValue::Long(v) => Ok(Symbol::Long(*v)),
            StateValue::Str(v) => Ok(Symbol::Name(v.clone())),
            StateValue::Null | StateValue::Double(_) | StateValue::Custom(_) => {
                Err(NodeError::UnsupportedValue(value.kind().to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_supported_values() {
        assert_eq!(Symbol::try_from(&StateValue::Int(7)), Ok(Symbol::Int(7)));
        assert_eq!(Symbol::try_from(&StateValue::Long(7)), Ok(Symbol::Long(7)));
        assert_eq!(
            Symbol::try_from(&StateValue::Str("main".into())),
            Ok(Symbol::from("main"))
        );
    }

    #[test]
    fn test_decode_rejects_other_kinds() {
        for value in [
            StateValue::Null,
            StateValue::Double(1.0),
            StateValue::Custom("{}".into()),
        ] {
            assert!(matches!(
                Symbol::try_from(&value),
                Err(NodeError::UnsupportedValue(_))
            ));
        }
    }

    #[test]
    fn test_int_and_long_are_distinct() {
        assert_ne!(Symbol::Int(16), Symbol::Long(16));
        assert_eq!(Symbol::Int(16).to_string(), "0x10");
        assert_eq!(Symbol::Long(16).to_string(), "0x10");
    }
}
