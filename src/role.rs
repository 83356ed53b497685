//! Anchor/tag role state machine
//!
//! The node alternates between the two ranging roles. Each role has its own
//! switch interval, and each role remembers when it was last entered. The
//! interval of the current role is always measured from the moment that role
//! was entered, never from a shared "last switch" timestamp.
//!
//! This module only decides *when* to switch. Reconfiguring the radio and
//! announcing the change is done by the [`Node`](crate::Node).

use core::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::time::{Duration, Instant};


/// The ranging role of the node
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Replies to ranging requests from tags
    Anchor,

    /// Initiates ranging towards anchors
    Tag,
}

impl Role {
    /// The role the node switches to from this one
    pub fn other(self) -> Self {
        match self {
            Role::Anchor => Role::Tag,
            Role::Tag => Role::Anchor,
        }
    }

    /// The wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Anchor => "ANCHOR",
            Role::Tag => "TAG",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("ANCHOR") {
            Ok(Role::Anchor)
        }
        else if s.eq_ignore_ascii_case("TAG") {
            Ok(Role::Tag)
        }
        else {
            Err(UnknownRole)
        }
    }
}

/// A role name that is neither `ANCHOR` nor `TAG`
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UnknownRole;

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("unknown device role")
    }
}


/// Current role plus the instant each role was last entered
#[derive(Clone, Copy, Debug)]
pub struct RoleState {
    current: Role,
    last_anchor_switch: Instant,
    last_tag_switch: Instant,
}

impl RoleState {
    /// Creates the state machine in `initial` role
    ///
    /// Both per-role timestamps are seeded with `now`, so the first interval
    /// is measured from startup, not from zero.
    pub fn new(initial: Role, now: Instant) -> Self {
        RoleState {
            current: initial,
            last_anchor_switch: now,
            last_tag_switch: now,
        }
    }

    /// The current role
    pub fn current(&self) -> Role {
        self.current
    }

    /// The instant `role` was last entered
    pub fn last_switch(&self, role: Role) -> Instant {
        match role {
            Role::Anchor => self.last_anchor_switch,
            Role::Tag => self.last_tag_switch,
        }
    }

    /// Time spent in the current role at `now`
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.duration_since(self.last_switch(self.current))
    }

    /// Switches role, if the current role's interval has elapsed
    ///
    /// `interval` maps a role to its switch interval. Returns the new role,
    /// if a switch happened.
    pub fn poll<F>(&mut self, now: Instant, interval: F) -> Option<Role>
        where F: Fn(Role) -> Duration
    {
        if self.elapsed(now) >= interval(self.current) {
            Some(self.switch(now))
        }
        else {
            None
        }
    }

    /// Unconditionally switches to the other role
    ///
    /// Records `now` against the role that is being entered.
    pub fn switch(&mut self, now: Instant) -> Role {
        self.current = self.current.other();
        match self.current {
            Role::Anchor => self.last_anchor_switch = now,
            Role::Tag => self.last_tag_switch = now,
        }
        self.current
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn reference(role: Role) -> Duration {
        match role {
            Role::Anchor => Duration(5_000),
            Role::Tag => Duration(15_000),
        }
    }

    #[test]
    fn parses_wire_names() {
        assert_eq!("ANCHOR".parse::<Role>(), Ok(Role::Anchor));
        assert_eq!("tag".parse::<Role>(), Ok(Role::Tag));
        assert_eq!("beacon".parse::<Role>(), Err(UnknownRole));
    }

    #[test]
    fn no_switch_at_startup() {
        let mut state = RoleState::new(Role::Anchor, Instant(12_345));

        assert_eq!(state.poll(Instant(12_345), reference), None);
        assert_eq!(state.poll(Instant(17_344), reference), None);
        assert_eq!(state.poll(Instant(17_345), reference), Some(Role::Tag));
    }

    #[test]
    fn alternates_with_role_specific_intervals() {
        let mut state = RoleState::new(Role::Anchor, Instant(0));

        assert_eq!(state.poll(Instant(5_001), reference), Some(Role::Tag));
        assert_eq!(state.last_switch(Role::Tag), Instant(5_001));
        assert_eq!(state.last_switch(Role::Anchor), Instant(0));

        // The anchor interval has long passed, but the node is a tag now.
        assert_eq!(state.poll(Instant(12_000), reference), None);
        assert_eq!(state.poll(Instant(20_000), reference), None);

        assert_eq!(state.poll(Instant(5_001 + 15_001), reference), Some(Role::Anchor));
        assert_eq!(state.last_switch(Role::Anchor), Instant(20_002));
    }

    #[test]
    fn anchor_interval_measured_from_anchor_entry() {
        let mut state = RoleState::new(Role::Tag, Instant(0));

        assert_eq!(state.poll(Instant(15_000), reference), Some(Role::Anchor));
        assert_eq!(state.poll(Instant(19_999), reference), None);
        assert_eq!(state.poll(Instant(20_000), reference), Some(Role::Tag));
    }

    #[test]
    fn serializes_uppercase() {
        let json: heapless::String<16> = serde_json_core::to_string(&Role::Tag).unwrap();
        assert_eq!(json.as_str(), "\"TAG\"");
    }
}
