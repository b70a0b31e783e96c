//! Identity types: service ids, request ids and message type ids.

macro_rules! imp_deref {
    ($i:ty, $t:ty) => {
        impl std::ops::Deref for $i {
            type Target = $t;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    };
}

macro_rules! imp_from {
    ($a:ty, $b:ty, $i:ident => $e:expr) => {
        impl From<$b> for $a {
            fn from($i: $b) -> Self {
                $e
            }
        }
    };
}

/// Stable opaque identifier of a service instance.
///
/// The layer never interprets these bytes. They are displayed as url-safe
/// base64, which makes debugging so much easier than rust's default of
/// decimal array.
#[derive(
    Clone,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct SvcUuid(
    #[serde(with = "crate::serde_bytes_base64")] pub bytes::Bytes,
);

imp_deref!(SvcUuid, bytes::Bytes);
imp_from!(SvcUuid, bytes::Bytes, b => SvcUuid(b));

impl SvcUuid {
    /// Construct a service id from static bytes.
    pub const fn from_static(b: &'static [u8]) -> Self {
        Self(bytes::Bytes::from_static(b))
    }
}

impl std::fmt::Display for SvcUuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use base64::prelude::*;
        f.write_str(&BASE64_URL_SAFE_NO_PAD.encode(&self.0))
    }
}

impl std::fmt::Debug for SvcUuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

/// Correlates a response envelope with its outstanding request.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct RequestId(pub u64);

imp_from!(RequestId, u64, id => RequestId(id));

impl RequestId {
    /// Reserved id meaning "no request is tracked". Never handed out by
    /// the request factory. Messages carrying it expect no response.
    pub const UNTRACKED: RequestId = RequestId(0);

    /// True if this is the [RequestId::UNTRACKED] sentinel.
    pub fn is_untracked(&self) -> bool {
        *self == Self::UNTRACKED
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Selects the handler for an inbound request.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct MsgTypeId(pub i32);

imp_from!(MsgTypeId, i32, id => MsgTypeId(id));

impl std::fmt::Display for MsgTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
