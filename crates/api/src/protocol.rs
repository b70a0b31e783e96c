//! Svcnet wire protocol types.
//!
//! Every message on the wire is an [SvcFrame]: an [Envelope] plus a
//! direction, so one connection can carry both requests and responses.

use crate::*;
use prost::Message;

/// Envelope status codes.
///
/// Zero is success. The codes below are synthesized locally or by the
/// dispatcher; any other non-zero code is a peer-defined error and is
/// passed through untouched.
pub mod status {
    /// Success.
    pub const OK: i32 = 0;

    /// The request could not be handed to the transport.
    pub const INVOCATION: i32 = 1001;

    /// The request timed out waiting for a response.
    pub const TIMEOUT: i32 = 1002;

    /// The remote handler failed without a more specific status.
    pub const HANDLER_FAILED: i32 = 1003;
}

/// Fixed header plus opaque payload carried by every message.
#[derive(Clone, PartialEq, Message)]
pub struct Envelope {
    /// Correlates responses with requests. Zero means untracked.
    #[prost(uint64, tag = "1")]
    pub request_id: u64,

    /// Selects the inbound handler.
    #[prost(int32, tag = "2")]
    pub msg_type_id: i32,

    /// The sending service.
    #[prost(bytes = "bytes", tag = "3")]
    pub src: bytes::Bytes,

    /// The receiving service.
    #[prost(bytes = "bytes", tag = "4")]
    pub dst: bytes::Bytes,

    /// Zero on success, see [status].
    #[prost(int32, tag = "5")]
    pub status: i32,

    /// Opaque payload bytes.
    #[prost(bytes = "bytes", tag = "6")]
    pub payload: bytes::Bytes,
}

impl Envelope {
    /// Construct a request envelope.
    pub fn new_request(
        request_id: RequestId,
        msg_type_id: MsgTypeId,
        src: SvcUuid,
        dst: SvcUuid,
        payload: bytes::Bytes,
    ) -> Self {
        Self {
            request_id: request_id.0,
            msg_type_id: msg_type_id.0,
            src: src.0,
            dst: dst.0,
            status: status::OK,
            payload,
        }
    }

    /// Produce the response header for this envelope: src and dst are
    /// swapped, the request id and message type are carried forward,
    /// status is reset and the payload is empty.
    pub fn swap(&self) -> Self {
        Self {
            request_id: self.request_id,
            msg_type_id: self.msg_type_id,
            src: self.dst.clone(),
            dst: self.src.clone(),
            status: status::OK,
            payload: bytes::Bytes::new(),
        }
    }

    /// The typed request id.
    pub fn request_id(&self) -> RequestId {
        RequestId(self.request_id)
    }

    /// The typed message type id.
    pub fn msg_type(&self) -> MsgTypeId {
        MsgTypeId(self.msg_type_id)
    }

    /// The typed sender id.
    pub fn src_uuid(&self) -> SvcUuid {
        SvcUuid(self.src.clone())
    }

    /// The typed receiver id.
    pub fn dst_uuid(&self) -> SvcUuid {
        SvcUuid(self.dst.clone())
    }

    /// Set an error status and payload from an error. Used to synthesize
    /// local error envelopes.
    pub fn with_error(mut self, err: &SvcError) -> Self {
        self.status = err.status_code();
        self.payload = err.status_payload();
        self
    }

    /// Set the status and payload of a response to a peer from a handler
    /// error. A [SvcError::Remote] keeps its status, any other kind is
    /// sent as [status::HANDLER_FAILED].
    pub fn with_handler_error(mut self, err: &SvcError) -> Self {
        match err {
            SvcError::Remote { status: code, payload } => {
                self.status = *code;
                self.payload = payload.clone();
            }
            oth => {
                self.status = status::HANDLER_FAILED;
                self.payload = bytes::Bytes::from(oth.to_string());
            }
        }
        self
    }

    /// Interpret this envelope as a response received from a peer: status
    /// zero yields the envelope, anything else a [SvcError::Remote].
    pub fn into_result(self) -> SvcResult<Self> {
        if self.status == status::OK {
            Ok(self)
        } else {
            Err(SvcError::from_status(self.status, self.payload))
        }
    }

    /// Interpret this envelope as a locally synthesized error response.
    pub fn into_local_result(self) -> SvcResult<Self> {
        if self.status == status::OK {
            Ok(self)
        } else {
            Err(SvcError::from_local_status(self.status, self.payload))
        }
    }
}

/// Direction of a frame.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    prost::Enumeration,
)]
#[repr(i32)]
pub enum FrameTy {
    /// Not set. Frames of this type are rejected.
    Unspecified = 0,

    /// An envelope that expects dispatch to a handler.
    Request = 1,

    /// An envelope that answers an outstanding request.
    Response = 2,
}

/// The unit sent over a transport.
#[derive(Clone, PartialEq, Message)]
pub struct SvcFrame {
    /// The [FrameTy] of this frame.
    #[prost(enumeration = "FrameTy", tag = "1")]
    pub ty: i32,

    /// The carried envelope.
    #[prost(message, optional, tag = "2")]
    pub envelope: Option<Envelope>,
}

impl SvcFrame {
    /// Wrap a request envelope.
    pub fn request(envelope: Envelope) -> Self {
        Self {
            ty: FrameTy::Request as i32,
            envelope: Some(envelope),
        }
    }

    /// Wrap a response envelope.
    pub fn response(envelope: Envelope) -> Self {
        Self {
            ty: FrameTy::Response as i32,
            envelope: Some(envelope),
        }
    }

    /// Encode this frame for the wire.
    pub fn encode_to_bytes(&self) -> bytes::Bytes {
        bytes::Bytes::from(self.encode_to_vec())
    }

    /// Decode a frame from the wire.
    pub fn decode_bytes(data: bytes::Bytes) -> SvcResult<Self> {
        Self::decode(data)
            .map_err(|err| SvcError::other_src("decode frame", err))
    }
}
