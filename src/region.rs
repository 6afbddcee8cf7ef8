/// Beacon regions: wildcard-capable matchers over the first three
/// identifiers and, optionally, the exact device address.
use alloc::string::String;
use core::fmt;
use core::hash::{Hash, Hasher};

use crate::beacon::BeaconRecord;
use crate::identifier::Identifier;

/// Number of identifier slots a region can constrain.
pub const REGION_SLOTS: usize = 3;

/// A group of beacons.
///
/// Regions compare equal by `unique_id` alone.
#[derive(Debug, Clone)]
pub struct Region {
    unique_id: String,
    identifiers: [Option<Identifier>; REGION_SLOTS],
    address: Option<String>,
}

impl Region {
    /// `None` slots are wildcards.
    pub fn new(
        unique_id: impl Into<String>,
        id1: Option<Identifier>,
        id2: Option<Identifier>,
        id3: Option<Identifier>,
    ) -> Self {
        Self {
            unique_id: unique_id.into(),
            identifiers: [id1, id2, id3],
            address: None,
        }
    }

    /// A region matching every beacon.
    pub fn wildcard(unique_id: impl Into<String>) -> Self {
        Self::new(unique_id, None, None, None)
    }

    /// Restrict the region to one device address (exact match).
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn identifier(&self, slot: usize) -> Option<&Identifier> {
        self.identifiers.get(slot).and_then(Option::as_ref)
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// True when every constrained slot and the address (if any) match.
    pub fn matches_beacon(&self, record: &BeaconRecord) -> bool {
        let identifiers_match = self
            .identifiers
            .iter()
            .enumerate()
            .all(|(slot, expected)| match expected {
                Some(id) => record.identifier(slot) == Some(id),
                None => true,
            });

        let address_matches = match self.address.as_deref() {
            Some(address) => record.address() == Some(address),
            None => true,
        };

        identifiers_match && address_matches
    }
}

impl PartialEq for Region {
    fn eq(&self, other: &Self) -> bool {
        self.unique_id == other.unique_id
    }
}

impl Eq for Region {}

impl Hash for Region {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.unique_id.hash(state);
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.unique_id)?;
        for (slot, id) in self.identifiers.iter().enumerate() {
            match id {
                Some(id) => write!(f, " id{}: {}", slot + 1, id)?,
                None => write!(f, " id{}: *", slot + 1)?,
            }
        }
        if let Some(address) = &self.address {
            write!(f, " mac: {address}")?;
        }
        Ok(())
    }
}
