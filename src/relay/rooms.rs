use std::collections::{HashMap, HashSet};

use super::registry::ConnectionKey;

/// Per-connection room membership. Lives inside the registry's lock so a
/// connection and its memberships disappear together.
#[derive(Debug, Default)]
pub(super) struct RoomMembership {
    members: HashMap<String, HashSet<ConnectionKey>>,
    joined: HashMap<ConnectionKey, HashSet<String>>,
}

impl RoomMembership {
    /// Returns false when the connection was already a member.
    pub(super) fn join(&mut self, key: ConnectionKey, room: &str) -> bool {
        let added = self.members.entry(room.to_owned()).or_default().insert(key);
        self.joined.entry(key).or_default().insert(room.to_owned());
        added
    }

    pub(super) fn members_of(&self, room: &str) -> impl Iterator<Item = ConnectionKey> + '_ {
        self.members.get(room).into_iter().flatten().copied()
    }

    pub(super) fn rooms_of(&self, key: ConnectionKey) -> Vec<String> {
        let mut rooms: Vec<_> = self.joined.get(&key).into_iter().flatten().cloned().collect();
        rooms.sort();
        rooms
    }

    pub(super) fn drop_connection(&mut self, key: ConnectionKey) {
        let Some(rooms) = self.joined.remove(&key) else {
            return;
        };
        for room in rooms {
            if let Some(members) = self.members.get_mut(&room) {
                members.remove(&key);
                if members.is_empty() {
                    self.members.remove(&room);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn joining_twice_is_the_same_as_joining_once() {
        let mut rooms = RoomMembership::default();
        let key = Uuid::now_v7();

        assert!(rooms.join(key, "r1"));
        assert!(!rooms.join(key, "r1"));

        assert_eq!(rooms.members_of("r1").collect::<Vec<_>>(), vec![key]);
        assert_eq!(rooms.rooms_of(key), vec!["r1".to_owned()]);
    }

    #[test]
    fn dropping_a_connection_empties_its_rooms() {
        let mut rooms = RoomMembership::default();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        rooms.join(a, "r1");
        rooms.join(a, "r2");
        rooms.join(b, "r1");

        rooms.drop_connection(a);
        rooms.drop_connection(a);

        assert_eq!(rooms.members_of("r1").collect::<Vec<_>>(), vec![b]);
        assert_eq!(rooms.members_of("r2").count(), 0);
        assert!(rooms.rooms_of(a).is_empty());
    }
}
