//! Fuzz target for document decoding.
//!
//! Documents are read back from a store other processes can write to, so
//! decoding arbitrary bytes must fail cleanly, and anything that decodes
//! must re-encode to an equal record.

#![no_main]

use libfuzzer_sys::fuzz_target;
use table_replicator::Record;

fuzz_target!(|data: &[u8]| {
    let Ok(doc) = std::str::from_utf8(data) else {
        return;
    };

    // Should never panic
    if let Ok(record) = Record::from_document(doc) {
        let encoded = record.to_document().expect("record always encodes");
        let again = Record::from_document(&encoded).expect("own encoding decodes");
        assert_eq!(record, again);
    }
});
