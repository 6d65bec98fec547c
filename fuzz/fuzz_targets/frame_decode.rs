//! Fuzz target for frame splitting and intent decoding
//!
//! Feeds arbitrary bytes through the stream splitter exactly as the runtime
//! would, then decodes every complete frame as an intent.
//!
//! # Invariants
//!
//! - NEVER panic on malformed input; all invalid data returns an error
//! - No frame above the limit is ever produced
//! - A frame that decodes re-encodes to a frame that decodes to the same intent

#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use parley_proto::{Frame, Intent};

const LIMIT: usize = 4096;

fuzz_target!(|data: &[u8]| {
    let _ = Frame::decode(data, LIMIT);

    let mut buf = BytesMut::from(data);
    while let Ok(Some(frame)) = Frame::split_from(&mut buf, LIMIT) {
        assert!(frame.payload().len() <= LIMIT);

        if let Ok(intent) = frame.to_message::<Intent>() {
            let again: Intent = Frame::from_message(&intent)
                .and_then(|f| f.to_message())
                .expect("decoded intent must re-encode");
            assert_eq!(again, intent);
        }
    }
});
