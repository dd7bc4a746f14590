//! Capability negotiation
//!
//! Static facts this backend advertises so the host can adapt its own logic
//! (for example, whether a fold ties up the table). Answers never depend on
//! the bucket or on table contents.

use std::fmt;
use std::str::FromStr;

/// Capability flags known to this backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Keys enumerate in lexicographic order
    HasOrderedKeys,

    /// A lookup reads key and value from one place (no separate index file)
    KeysAndValuesStoredTogether,

    /// Version metadata travels inside the value blob
    VclocksAndValuesStoredTogether,

    /// A fold occupies the table for its whole duration
    FoldWillBlock,
}

/// The capability table: every known flag with this backend's answer
const CAPABILITIES: [(Capability, bool); 4] = [
    (Capability::HasOrderedKeys, false),
    (Capability::KeysAndValuesStoredTogether, true),
    (Capability::VclocksAndValuesStoredTogether, true),
    (Capability::FoldWillBlock, true),
];

impl Capability {
    /// All known capabilities
    pub const ALL: [Capability; 4] = [
        Capability::HasOrderedKeys,
        Capability::KeysAndValuesStoredTogether,
        Capability::VclocksAndValuesStoredTogether,
        Capability::FoldWillBlock,
    ];

    /// Wire name of the flag, as the host spells it
    pub fn name(&self) -> &'static str {
        match self {
            Capability::HasOrderedKeys => "has_ordered_keys",
            Capability::KeysAndValuesStoredTogether => "keys_and_values_stored_together",
            Capability::VclocksAndValuesStoredTogether => "vclocks_and_values_stored_together",
            Capability::FoldWillBlock => "fold_will_block",
        }
    }

    /// Parse a flag name; `None` for flags this backend does not know
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cap| cap.name() == name)
    }

    /// This backend's answer for the flag
    pub fn supported(&self) -> bool {
        CAPABILITIES
            .iter()
            .find(|(cap, _)| cap == self)
            .map(|(_, answer)| *answer)
            .unwrap_or(false)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown capability: {}", s))
    }
}

/// Answer a capability query by flag name; unknown flags are `false`
pub fn lookup(flag: &str) -> bool {
    Capability::from_name(flag)
        .map(|cap| cap.supported())
        .unwrap_or(false)
}
