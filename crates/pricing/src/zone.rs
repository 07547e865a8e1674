//! Geographic zones and the addresses they match.

use farmgate_core::entity_id;
use serde::{Deserialize, Serialize};

entity_id!(
    /// Zone identifier.
    ZoneId
);

/// The slice of an address tax matching needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub country: String,
    pub state: Option<String>,
    pub zipcode: Option<String>,
}

impl Address {
    pub fn new(country: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            state: None,
            zipcode: None,
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }
}

/// One covered region of a zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneMember {
    Country(String),
    State { country: String, state: String },
}

impl ZoneMember {
    fn includes_address(&self, address: &Address) -> bool {
        match self {
            ZoneMember::Country(country) => *country == address.country,
            ZoneMember::State { country, state } => {
                *country == address.country && Some(state) == address.state.as_ref()
            }
        }
    }

    /// How narrow the region is; a state is tighter than a country.
    fn granularity(&self) -> u8 {
        match self {
            ZoneMember::Country(_) => 0,
            ZoneMember::State { .. } => 1,
        }
    }

    /// Whether this member covers everything `other` covers.
    fn covers(&self, other: &ZoneMember) -> bool {
        match (self, other) {
            (ZoneMember::Country(a), ZoneMember::Country(b)) => a == b,
            (ZoneMember::Country(a), ZoneMember::State { country, .. }) => a == country,
            (ZoneMember::State { .. }, ZoneMember::Country(_)) => false,
            (a @ ZoneMember::State { .. }, b @ ZoneMember::State { .. }) => a == b,
        }
    }
}

/// A named set of regions tax rates attach to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    pub members: Vec<ZoneMember>,
    /// The home zone whose inclusive prices need no extraction adjustment.
    pub default_tax: bool,
}

impl Zone {
    pub fn new(name: impl Into<String>, members: Vec<ZoneMember>) -> Self {
        Self {
            id: ZoneId::new(),
            name: name.into(),
            members,
            default_tax: false,
        }
    }

    pub fn default_tax_zone(mut self) -> Self {
        self.default_tax = true;
        self
    }

    pub fn includes(&self, address: &Address) -> bool {
        self.members.iter().any(|m| m.includes_address(address))
    }

    /// The granularity of the tightest member covering `address`, or `None`
    /// when the zone does not cover it. Ranks a state-member match above a
    /// country-member match regardless of how many members each zone lists.
    pub fn match_granularity(&self, address: &Address) -> Option<u8> {
        self.members
            .iter()
            .filter(|m| m.includes_address(address))
            .map(ZoneMember::granularity)
            .max()
    }

    /// Whether every region of `other` is covered by this zone.
    pub fn contains(&self, other: &Zone) -> bool {
        !other.members.is_empty()
            && other
                .members
                .iter()
                .all(|om| self.members.iter().any(|m| m.covers(om)))
    }
}
