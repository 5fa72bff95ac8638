//! Strongly-typed numeric identifiers for VMmanager resources.
//!
//! The service addresses every resource by an integer id. Wrapping each kind in
//! its own type keeps a disk id from being passed where a VM id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Largest float that still holds every smaller integer exactly (2^53).
const MAX_EXACT_FLOAT_ID: f64 = 9_007_199_254_740_992.0;

/// Macro to generate strongly-typed numeric id wrapper types.
macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $doc:expr) => {
        $(#[$meta])*
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw numeric id.
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the raw numeric id.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }

            /// Reads the id from a JSON number.
            ///
            /// The service encodes ids as JSON numbers which may carry a fractional
            /// zero (`42.0`). Floats that are negative, non-integral or beyond
            /// 2^53 (where integers stop being exact) are rejected.
            #[must_use]
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            pub fn from_json(value: &serde_json::Value) -> Option<Self> {
                if let Some(id) = value.as_u64() {
                    return Some(Self(id));
                }
                value
                    .as_f64()
                    .filter(|f| (0.0..=MAX_EXACT_FLOAT_ID).contains(f) && f.fract() == 0.0)
                    .map(|f| Self(f as u64))
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u64 {
            fn from(wrapper: $name) -> Self {
                wrapper.0
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|_| Error::ValidationError(format!("invalid {}: {s}", stringify!($name))))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(VmId, "Virtual machine (host) id");
numeric_id!(TaskId, "Background task id, as reported in the `task` field of a mutation response");
numeric_id!(DiskId, "Disk id");
numeric_id!(AccountId, "Account (owner) id");
numeric_id!(NodeId, "Cluster node id");

/// Caller-supplied handle identifying a target VM.
///
/// Carries no cached state and is not tied to any session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VmRef {
    vm_id: VmId,
}

impl VmRef {
    /// Create a reference to the VM with the given id.
    #[must_use]
    pub const fn new(vm_id: u64) -> Self {
        Self {
            vm_id: VmId::new(vm_id),
        }
    }

    /// The referenced VM id.
    #[must_use]
    pub const fn vm_id(&self) -> VmId {
        self.vm_id
    }
}

impl From<VmId> for VmRef {
    fn from(vm_id: VmId) -> Self {
        Self { vm_id }
    }
}

impl fmt::Display for VmRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.vm_id)
    }
}
