#![deny(missing_docs)]
//! Svcnet API contains the traits and basic types of the service layer
//! asynchronous request subsystem.
//!
//! Services address each other by opaque [SvcUuid]s and exchange
//! [protocol::Envelope]-wrapped messages. The implementation of the request
//! state machine, registry and dispatcher lives in the svcnet_core crate.

/// Boxed future type.
pub type BoxFut<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

pub(crate) mod serde_bytes_base64 {
    pub fn serialize<S>(
        b: &bytes::Bytes,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use base64::prelude::*;
        serializer.serialize_str(&BASE64_URL_SAFE_NO_PAD.encode(b))
    }

    pub fn deserialize<'de, D, T: From<bytes::Bytes>>(
        deserializer: D,
    ) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use base64::prelude::*;
        let s: String = serde::Deserialize::deserialize(deserializer)?;
        BASE64_URL_SAFE_NO_PAD
            .decode(s)
            .map(|v| bytes::Bytes::from(v).into())
            .map_err(serde::de::Error::custom)
    }
}

pub mod builder;
pub mod config;
pub mod endpoint;
pub mod handler;
pub mod request;
pub mod transport;

mod error;
pub use error::*;

pub mod id;
pub use id::{MsgTypeId, RequestId, SvcUuid};

pub mod protocol;
pub use protocol::{status, Envelope, FrameTy, SvcFrame};
