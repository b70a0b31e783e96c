//! Test utilities associated with ids.

use svcnet_api::SvcUuid;

use crate::random_bytes;

/// Create a random service id.
pub fn random_svc_uuid() -> SvcUuid {
    SvcUuid(bytes::Bytes::from(random_bytes(16)))
}
