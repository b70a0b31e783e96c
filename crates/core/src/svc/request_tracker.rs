//! The in-flight request registry.

use std::collections::{hash_map::Entry, HashMap};
use std::sync::Mutex;
use svcnet_api::{request::DynSvcRequest, *};

/// Maps request ids to outstanding requests.
///
/// The lock is only held for the map operation itself. Lookups hand out a
/// clone of the request handle, so no request code ever runs while the
/// registry is locked.
#[derive(Debug, Default)]
pub struct RequestTracker {
    map: Mutex<HashMap<RequestId, DynSvcRequest>>,
}

impl RequestTracker {
    /// Insert a request. Fails with [SvcError::DuplicateId] if the id is
    /// already present, leaving the existing entry untouched.
    pub fn register(
        &self,
        id: RequestId,
        request: DynSvcRequest,
    ) -> SvcResult<()> {
        match self.map.lock().unwrap().entry(id) {
            Entry::Occupied(_) => Err(SvcError::DuplicateId(id)),
            Entry::Vacant(e) => {
                e.insert(request);
                Ok(())
            }
        }
    }

    /// Look up a request.
    pub fn get(&self, id: RequestId) -> Option<DynSvcRequest> {
        self.map.lock().unwrap().get(&id).cloned()
    }

    /// Remove a request, returning it if it was present.
    pub fn remove(&self, id: RequestId) -> Option<DynSvcRequest> {
        self.map.lock().unwrap().remove(&id)
    }

    /// Number of registered requests.
    pub fn len(&self) -> usize {
        self.map.lock().unwrap().len()
    }

    /// True if no requests are registered.
    pub fn is_empty(&self) -> bool {
        self.map.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use svcnet_api::request::SvcRequest;

    #[derive(Debug)]
    struct NoopRequest(RequestId);

    impl SvcRequest for NoopRequest {
        fn id(&self) -> RequestId {
            self.0
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }

        fn invoke(&self) {}

        fn handle_response(&self, _envelope: Envelope) {}

        fn handle_local_error(&self, _envelope: Envelope) {}

        fn is_complete(&self) -> bool {
            false
        }
    }

    #[test]
    fn register_get_remove() {
        let tracker = RequestTracker::default();
        assert!(tracker.is_empty());

        tracker
            .register(RequestId(1), Arc::new(NoopRequest(RequestId(1))))
            .unwrap();
        assert_eq!(1, tracker.len());
        assert_eq!(RequestId(1), tracker.get(RequestId(1)).unwrap().id());
        assert!(tracker.get(RequestId(2)).is_none());

        assert!(tracker.remove(RequestId(1)).is_some());
        assert!(tracker.remove(RequestId(1)).is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn duplicate_register_fails_and_keeps_original() {
        let tracker = RequestTracker::default();
        let first: DynSvcRequest = Arc::new(NoopRequest(RequestId(5)));

        tracker.register(RequestId(5), first.clone()).unwrap();

        let res = tracker
            .register(RequestId(5), Arc::new(NoopRequest(RequestId(5))));
        assert!(matches!(res, Err(SvcError::DuplicateId(RequestId(5)))));

        assert!(Arc::ptr_eq(&first, &tracker.get(RequestId(5)).unwrap()));
    }
}
