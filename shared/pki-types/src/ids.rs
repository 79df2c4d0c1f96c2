use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected identifier. The message is deliberately generic, the offending value is not echoed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {name}")]
pub struct InvalidId {
    pub name: &'static str,
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $ty:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $ty(u64);

        impl $ty {
            #[must_use]
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $ty {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl FromStr for $ty {
            type Err = InvalidId;

            /// Only plain decimal digits are accepted, so the value can be
            /// interpolated into backend paths
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(InvalidId { name: $name });
                }
                s.parse::<u64>()
                    .map(Self)
                    .map_err(|_| InvalidId { name: $name })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Identifier of a DFSP tenant
    DfspId,
    "dfspId"
);

numeric_id!(
    /// Identifier of an enrollment, unique per DFSP and direction
    EnrollmentId,
    "enId"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_ids_parse() {
        assert_eq!("42".parse::<DfspId>().unwrap(), DfspId::new(42));
        assert_eq!("7".parse::<EnrollmentId>().unwrap().get(), 7);
    }

    #[test]
    fn test_rejects_path_injection() {
        for input in ["", "abc", "1/../2", "../secrets", "12 ", "-1", "NaN", "1e3"] {
            let err = input.parse::<DfspId>().unwrap_err();
            assert_eq!(err.to_string(), "Invalid dfspId", "input: {input:?}");
        }
        assert_eq!(
            "x".parse::<EnrollmentId>().unwrap_err().to_string(),
            "Invalid enId"
        );
    }
}
