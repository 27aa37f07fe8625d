//! Fuzz target: `FrameDecoder::feed`
//!
//! Arbitrary bytes go through the streaming decoder twice: once whole and
//! once split at a fuzzer-chosen point. Both passes must yield the same
//! payloads, none empty or larger than `MAX_FRAME_SIZE`.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use chanrpc::rpc::codec::{FrameDecoder, MAX_FRAME_SIZE, decode_message};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut decoder = FrameDecoder::new();
    let whole = decoder.feed(data);
    for payload in &whole {
        assert!(!payload.is_empty(), "decoder yielded an empty payload");
        assert!(payload.len() <= MAX_FRAME_SIZE, "payload exceeds MAX_FRAME_SIZE");
        let _ = decode_message(payload);
    }

    decoder.reset();
    let split = data.first().map_or(0, |b| *b as usize).min(data.len());
    let mut pieces = decoder.feed(&data[..split]);
    pieces.extend(decoder.feed(&data[split..]));
    assert_eq!(whole, pieces, "chunking changed the decoded frames");
});
