//! Protocol module containing the persisted record types and the JSON codec.

pub mod codec;
pub mod records;

pub use codec::{
    decode_cache_entry, decode_record, encode_cache_entry, encode_record, CodecError,
};
pub use records::*;
