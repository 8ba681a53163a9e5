mod error;
pub mod transport;

use std::ops::{Index, IndexMut};

pub use error::Error;
use serde::{Deserialize, Serialize};
#[cfg(feature = "in-memory-infra")]
pub use transport::InMemoryTransport;
pub use transport::{Message, OpTag, Operation, Transport};

/// Represents a unique role of the party inside the attribution circuit. The publisher holds
/// touchpoints (ad exposures and clicks), the partner holds conversions.
/// Each party process may take either role, but once the role is assigned, it cannot
/// be changed for the remainder of the run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum Role {
    Publisher = 0,
    Partner = 1,
}

impl Role {
    const PUBLISHER_STR: &'static str = "publisher";
    const PARTNER_STR: &'static str = "partner";

    /// Returns the other party of the two-party computation.
    #[must_use]
    pub const fn peer(self) -> Role {
        match self {
            Role::Publisher => Role::Partner,
            Role::Partner => Role::Publisher,
        }
    }

    #[must_use]
    pub fn as_static_str(&self) -> &'static str {
        match self {
            Role::Publisher => Role::PUBLISHER_STR,
            Role::Partner => Role::PARTNER_STR,
        }
    }

    /// Need `derive_const` feature to get out of nightly to get rid of this function.
    #[must_use]
    pub const fn eq(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Role::Publisher, Role::Publisher) | (Role::Partner, Role::Partner)
        )
    }
}

crate::const_assert!(Role::eq(Role::Publisher.peer(), Role::Partner));
crate::const_assert!(Role::eq(Role::Partner.peer(), Role::Publisher));

impl From<Role> for &'static str {
    fn from(role: Role) -> Self {
        role.as_static_str()
    }
}

impl TryFrom<&str> for Role {
    type Error = crate::error::Error;

    fn try_from(id: &str) -> std::result::Result<Self, Self::Error> {
        match id {
            Role::PUBLISHER_STR => Ok(Role::Publisher),
            Role::PARTNER_STR => Ok(Role::Partner),
            other => Err(crate::error::Error::Unsupported(format!(
                "unexpected role \"{other}\""
            ))),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = crate::error::Error;

    fn try_from(id: String) -> std::result::Result<Self, Self::Error> {
        Role::try_from(id.as_str())
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        self.as_static_str()
    }
}

impl<T> Index<Role> for [T] {
    type Output = T;

    fn index(&self, index: Role) -> &Self::Output {
        self.index(index as usize)
    }
}

impl<T> IndexMut<Role> for [T] {
    fn index_mut(&mut self, index: Role) -> &mut Self::Output {
        self.index_mut(index as usize)
    }
}

impl<T> Index<Role> for Vec<T> {
    type Output = T;

    fn index(&self, index: Role) -> &Self::Output {
        self.as_slice().index(index)
    }
}

impl<T> IndexMut<Role> for Vec<T> {
    fn index_mut(&mut self, index: Role) -> &mut Self::Output {
        self.as_mut_slice().index_mut(index)
    }
}
