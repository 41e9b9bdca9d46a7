//! Fuzz target for request decoding.
//!
//! Decoding arbitrary lines must never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use perch::{PutRequest, QueryRequest};

fuzz_target!(|data: &[u8]| {
    let _ = PutRequest::parse(data);
    let _ = QueryRequest::parse(data);
});
