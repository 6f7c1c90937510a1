use serde::{Deserialize, Serialize};

use crate::ids::HuntGroupId;

/// Fork strategy for a [`HuntGroup`].
///
/// `RoundRobin` and `LongestIdle` are kept as distinct variants rather
/// than aliased away at the type level, but the engine currently
/// routes both through the same sequential walk `Sequential` uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HuntGroupStrategy {
    Simultaneous,
    Sequential,
    // TODO: give `HuntGroup` a `last_served_index: AtomicUsize` and walk
    // members starting after it instead of always from priority 0.
    RoundRobin,
    // TODO: track `last_call: Option<DateTime<Utc>>` per `Member` and
    // sort the walk by it instead of by declared priority.
    LongestIdle,
}

impl HuntGroupStrategy {
    /// Whether this strategy forks to every enabled member at once.
    pub fn is_simultaneous(self) -> bool {
        matches!(self, HuntGroupStrategy::Simultaneous)
    }
}

/// One member of a [`HuntGroup`]'s ordered member list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub priority: u32,
    pub extension: String,
    pub timeout_secs: Option<u32>,
    pub enabled: bool,
}

impl Member {
    pub fn new(priority: u32, extension: impl Into<String>) -> Self {
        Member { priority, extension: extension.into(), timeout_secs: None, enabled: true }
    }
}

/// A dialable hunt group: an Extension, a fork Strategy, a
/// group-level ring timeout, and an ordered Member list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HuntGroup {
    pub id: HuntGroupId,
    pub extension: String,
    pub strategy: HuntGroupStrategy,
    pub ring_timeout_secs: u32,
    pub enabled: bool,
    pub members: Vec<Member>,
}

impl HuntGroup {
    pub fn new(extension: impl Into<String>, strategy: HuntGroupStrategy) -> Self {
        HuntGroup {
            id: HuntGroupId::new(),
            extension: extension.into(),
            strategy,
            ring_timeout_secs: 0,
            enabled: true,
            members: Vec::new(),
        }
    }

    /// Enabled members, ascending by priority.
    pub fn ordered_enabled_members(&self) -> Vec<&Member> {
        let mut members: Vec<&Member> = self.members.iter().filter(|m| m.enabled).collect();
        members.sort_by_key(|m| m.priority);
        members
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_enabled_members_filters_and_sorts() {
        let mut group = HuntGroup::new("2000", HuntGroupStrategy::Sequential);
        group.members.push(Member::new(3, "2003"));
        group.members.push(Member::new(1, "2001"));
        let mut disabled = Member::new(2, "2002");
        disabled.enabled = false;
        group.members.push(disabled);
        let ordered: Vec<&str> = group.ordered_enabled_members().into_iter().map(|m| m.extension.as_str()).collect();
        assert_eq!(ordered, vec!["2001", "2003"]);
    }
}
