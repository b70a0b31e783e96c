//! An in-memory service map implementing [EndpointDirectory].
//!
//! The map is fed with [SvcInfo] records by whatever distributes cluster
//! membership. Incarnations order the records for one service: a restarted
//! service comes back with a higher incarnation and replaces the old entry.

use std::collections::{hash_map::Entry, HashMap};
use std::sync::{Arc, Mutex};
use svcnet_api::{endpoint::*, *};

/// Liveness of a service map entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum SvcStatus {
    /// Reachable.
    Active,

    /// Down. Resolving it fails.
    Inactive,
}

/// One service map record.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SvcInfo {
    /// The service.
    pub svc_uuid: SvcUuid,

    /// Transport address of the service.
    pub addr: String,

    /// Incarnation of the service.
    pub incarnation: u64,

    /// Liveness of the service.
    pub status: SvcStatus,
}

impl SvcInfo {
    /// An active record.
    pub fn active(
        svc_uuid: SvcUuid,
        addr: impl Into<String>,
        incarnation: u64,
    ) -> Self {
        Self {
            svc_uuid,
            addr: addr.into(),
            incarnation,
            status: SvcStatus::Active,
        }
    }
}

/// In-memory [EndpointDirectory].
#[derive(Debug, Default)]
pub struct MemEndpointDirectory {
    map: Mutex<HashMap<SvcUuid, SvcInfo>>,
}

impl MemEndpointDirectory {
    /// Construct an empty directory.
    pub fn create() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Apply service map records. For each record:
    /// - an unknown service is inserted,
    /// - a higher incarnation replaces the entry,
    /// - the same incarnation with [SvcStatus::Inactive] marks it down,
    /// - anything else is stale and ignored.
    ///
    /// Returns the number of records applied.
    pub fn update_svc_map(&self, records: Vec<SvcInfo>) -> usize {
        let mut applied = 0;
        let mut lock = self.map.lock().unwrap();
        for record in records {
            let cur = match lock.entry(record.svc_uuid.clone()) {
                Entry::Vacant(e) => {
                    tracing::debug!(
                        svc = %record.svc_uuid,
                        addr = %record.addr,
                        "adding service",
                    );
                    e.insert(record);
                    applied += 1;
                    continue;
                }
                Entry::Occupied(e) => e.into_mut(),
            };

            if record.incarnation > cur.incarnation {
                tracing::debug!(
                    svc = %record.svc_uuid,
                    old = cur.incarnation,
                    new = record.incarnation,
                    "service restarted",
                );
                *cur = record;
                applied += 1;
            } else if record.incarnation == cur.incarnation
                && record.status == SvcStatus::Inactive
            {
                tracing::debug!(svc = %record.svc_uuid, "service down");
                cur.status = SvcStatus::Inactive;
                applied += 1;
            } else {
                tracing::trace!(
                    svc = %record.svc_uuid,
                    "ignoring stale record",
                );
            }
        }
        applied
    }

    /// Current record of a service.
    pub fn get(&self, svc_uuid: &SvcUuid) -> Option<SvcInfo> {
        self.map.lock().unwrap().get(svc_uuid).cloned()
    }
}

impl EndpointDirectory for MemEndpointDirectory {
    fn resolve(&self, svc_uuid: &SvcUuid) -> SvcResult<EndpointHandle> {
        match self.map.lock().unwrap().get(svc_uuid) {
            None => Err(SvcError::invocation(format!(
                "svc handle not found for {svc_uuid}"
            ))),
            Some(info) if info.status == SvcStatus::Inactive => Err(
                SvcError::invocation(format!("svc {svc_uuid} is down")),
            ),
            Some(info) => Ok(EndpointHandle {
                svc_uuid: info.svc_uuid.clone(),
                addr: info.addr.clone(),
                incarnation: info.incarnation,
            }),
        }
    }

    fn mark_down(&self, svc_uuid: &SvcUuid) {
        if let Some(info) = self.map.lock().unwrap().get_mut(svc_uuid) {
            tracing::debug!(
                svc = %svc_uuid,
                "marking service down after send failure",
            );
            info.status = SvcStatus::Inactive;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SM: SvcUuid = SvcUuid::from_static(b"sm");

    #[test]
    fn incarnation_rules() {
        let dir = MemEndpointDirectory::create();

        assert_eq!(1, dir.update_svc_map(vec![SvcInfo::active(SM, "a:1", 3)]));
        assert_eq!("a:1", dir.resolve(&SM).unwrap().addr);

        // stale incarnation ignored
        assert_eq!(0, dir.update_svc_map(vec![SvcInfo::active(SM, "a:0", 2)]));
        assert_eq!("a:1", dir.resolve(&SM).unwrap().addr);

        // same incarnation inactive marks down
        let mut down = SvcInfo::active(SM, "a:1", 3);
        down.status = SvcStatus::Inactive;
        assert_eq!(1, dir.update_svc_map(vec![down]));
        assert!(matches!(
            dir.resolve(&SM),
            Err(SvcError::Invocation { .. })
        ));

        // restart replaces
        assert_eq!(1, dir.update_svc_map(vec![SvcInfo::active(SM, "a:2", 4)]));
        let handle = dir.resolve(&SM).unwrap();
        assert_eq!("a:2", handle.addr);
        assert_eq!(4, handle.incarnation);
    }

    #[test]
    fn unknown_and_marked_down_fail_to_resolve() {
        let dir = MemEndpointDirectory::create();
        assert!(matches!(
            dir.resolve(&SM),
            Err(SvcError::Invocation { .. })
        ));

        dir.update_svc_map(vec![SvcInfo::active(SM, "a:1", 1)]);
        dir.mark_down(&SM);
        assert_eq!(SvcStatus::Inactive, dir.get(&SM).unwrap().status);
        assert!(dir.resolve(&SM).is_err());
    }
}
