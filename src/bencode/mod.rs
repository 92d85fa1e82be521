pub mod bvalue;
pub mod decode;
pub mod encode;
pub mod error;

pub use bvalue::{BDict, BValue};   // re-export
pub use decode::{decode, decode_prefix, decode_with};   // re-export
pub use encode::{bvalue_to_json, encode_bvalue, encode_dict, encode_into};   // re-export
pub use error::BencodeError;
