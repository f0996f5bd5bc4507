// ── Participant registry ──
//
// Index of registered participants by GUID and by connection. The
// coordinator guards the live copy with a mutex and publishes cheap
// shallow clones for readers.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::warn;

use crate::model::Participant;
use crate::transport::{ConnectionId, Outbound, Payload};

/// Outcome of a broadcast. Failures never abort the fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Participants keyed by GUID, with a reverse index by connection.
///
/// `Clone` is shallow: participants are shared.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    by_guid: BTreeMap<String, Arc<Participant>>,
    by_connection: HashMap<ConnectionId, String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a participant. `false` if its GUID or connection is taken.
    pub fn register(&mut self, participant: Arc<Participant>) -> bool {
        if self.by_guid.contains_key(participant.guid())
            || self.by_connection.contains_key(&participant.connection())
        {
            return false;
        }
        self.by_connection
            .insert(participant.connection(), participant.guid().to_owned());
        self.by_guid
            .insert(participant.guid().to_owned(), participant);
        true
    }

    /// Remove by GUID, deactivating the participant.
    pub fn remove_by_guid(&mut self, guid: &str) -> bool {
        let Some(participant) = self.by_guid.remove(guid) else {
            return false;
        };
        self.by_connection.remove(&participant.connection());
        participant.deactivate();
        true
    }

    /// Remove whatever is bound to `connection`, returning its GUID.
    pub fn remove_by_connection(&mut self, connection: ConnectionId) -> Option<String> {
        let guid = self.by_connection.get(&connection)?.clone();
        self.remove_by_guid(&guid);
        Some(guid)
    }

    pub fn find_by_guid(&self, guid: &str) -> Option<Arc<Participant>> {
        self.by_guid.get(guid).cloned()
    }

    pub fn find_by_connection(&self, connection: ConnectionId) -> Option<Arc<Participant>> {
        self.by_connection
            .get(&connection)
            .and_then(|guid| self.find_by_guid(guid))
    }

    pub fn contains_guid(&self, guid: &str) -> bool {
        self.by_guid.contains_key(guid)
    }

    pub fn len(&self) -> usize {
        self.by_guid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_guid.is_empty()
    }

    /// Participants in GUID order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Participant>> {
        self.by_guid.values()
    }

    pub fn guids(&self) -> impl Iterator<Item = &str> {
        self.by_guid.keys().map(String::as_str)
    }

    /// Shallow copy sharing every participant.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Send `payload` to every participant except `exclude`.
    pub fn broadcast(
        &self,
        outbound: &dyn Outbound,
        payload: &Payload,
        exclude: Option<ConnectionId>,
    ) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for participant in self.by_guid.values() {
            let conn = participant.connection();
            if Some(conn) == exclude {
                continue;
            }
            match outbound.send(conn, payload) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(guid = %participant.guid(), conn = %conn, error = %e, "broadcast delivery failed");
                }
            }
        }
        report
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{EquipmentType, Registration};
    use crate::transport::ConnectionTable;

    fn participant(guid: &str, conn: ConnectionId) -> Arc<Participant> {
        Arc::new(Participant::new(
            guid,
            conn,
            Registration::new(guid, Some(EquipmentType::Sensor)),
        ))
    }

    #[test]
    fn guid_and_connection_are_unique() {
        let mut reg = Registry::new();
        let a = ConnectionId::from_raw(1);
        let b = ConnectionId::from_raw(2);
        assert!(reg.register(participant("g1", a)));
        assert!(!reg.register(participant("g1", b)));
        assert!(!reg.register(participant("g2", a)));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn removal_keeps_indexes_in_sync() {
        let mut reg = Registry::new();
        let conn = ConnectionId::from_raw(1);
        let p = participant("g1", conn);
        reg.register(Arc::clone(&p));

        assert_eq!(reg.remove_by_connection(conn).as_deref(), Some("g1"));
        assert!(!p.is_active());
        assert!(reg.find_by_guid("g1").is_none());
        assert!(reg.find_by_connection(conn).is_none());
        assert_eq!(reg.remove_by_connection(conn), None);
        assert!(!reg.remove_by_guid("g1"));
    }

    #[test]
    fn snapshot_is_unaffected_by_later_changes() {
        let mut reg = Registry::new();
        reg.register(participant("g1", ConnectionId::from_raw(1)));
        let snap = reg.snapshot();
        reg.register(participant("g2", ConnectionId::from_raw(2)));
        assert_eq!(snap.len(), 1);
        assert_eq!(reg.guids().collect::<Vec<_>>(), vec!["g1", "g2"]);
    }

    #[test]
    fn broadcast_skips_excluded_and_counts_failures() {
        let table = ConnectionTable::default();
        let (c1, mut r1) = table.open();
        let (c2, mut r2) = table.open();
        let (c3, r3) = table.open();
        drop(r3);

        let mut reg = Registry::new();
        reg.register(participant("a", c1));
        reg.register(participant("b", c2));
        reg.register(participant("c", c3));

        let report = reg.broadcast(&table, &Arc::from("hi"), Some(c1));
        assert_eq!(report, BroadcastReport { delivered: 1, failed: 1 });
        assert!(r1.try_recv().is_err());
        assert_eq!(&*r2.try_recv().unwrap(), "hi");
    }
}
