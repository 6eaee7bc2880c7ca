use crate::types::{NUM_GROUPS, NUM_TRACKS};

/// Which tracks belong to which group.
///
/// A dense membership matrix over track indices instead of per-group
/// pointer lists: no allocation, no cross-references into the track
/// arena, constant-time updates from the state machine.
#[derive(Debug)]
pub struct GroupSet {
    members: [[bool; NUM_TRACKS]; NUM_GROUPS],
}

impl GroupSet {
    pub fn new() -> Self {
        Self {
            members: [[false; NUM_TRACKS]; NUM_GROUPS],
        }
    }

    pub fn insert(&mut self, group: usize, track: usize) {
        if group < NUM_GROUPS && track < NUM_TRACKS {
            self.members[group][track] = true;
        }
    }

    pub fn remove(&mut self, group: usize, track: usize) {
        if group < NUM_GROUPS && track < NUM_TRACKS {
            self.members[group][track] = false;
        }
    }

    pub fn contains(&self, group: usize, track: usize) -> bool {
        group < NUM_GROUPS && track < NUM_TRACKS && self.members[group][track]
    }

    /// Iterate the track indices that belong to `group`.
    pub fn tracks(&self, group: usize) -> impl Iterator<Item = usize> + '_ {
        self.members[group]
            .iter()
            .enumerate()
            .filter_map(|(t, member)| member.then_some(t))
    }

    /// Drop every membership.
    pub fn clear(&mut self) {
        self.members = [[false; NUM_TRACKS]; NUM_GROUPS];
    }
}

impl Default for GroupSet {
    fn default() -> Self {
        Self::new()
    }
}
