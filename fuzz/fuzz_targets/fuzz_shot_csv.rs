//! Fuzz target for CSV shot log ingest.
//!
//! Tests that `read_bytes` handles arbitrary input without panicking and
//! that every row it reads is either kept or counted as dropped.

#![no_main]

use hh_core::ingest::{read_bytes, InputFormat};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(output) = read_bytes(data, InputFormat::Csv) {
        let report = &output.report;
        assert_eq!(report.rows_kept, output.events.len());
        assert_eq!(report.rows_kept + report.rows_dropped(), report.rows_read);
    }
});
