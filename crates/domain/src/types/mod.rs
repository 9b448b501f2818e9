//! Domain types and models

pub mod envelope;
pub mod request;
pub mod wire;

pub use envelope::{parse_limit, Envelope};
pub use request::{
    params, Credentials, FileAttachment, FileFingerprint, Method, Migrations, ParamValue, Params,
    RequestFlags, RequestSpec,
};
pub use wire::{BatchEntry, BatchSlot, RawResponse};
