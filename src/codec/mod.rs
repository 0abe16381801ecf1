// src/codec/mod.rs
mod json;
mod result;

pub use json::{
    decode_lines, decode_result, encode_as, encode_line, encode_report, encode_result,
    CodecError, ReportFormat,
};
pub use result::{ProbeFailure, ProbeResult};
