//! Property-based tests for outgoing message splitting.
//!
//! Uses proptest to verify:
//! 1. Concatenating the chunks of any text within the limit reproduces it.
//! 2. Every chunk respects the chunk size and only the last may be short.
//! 3. Text beyond the limit is rejected and submits no sends at all.

use std::sync::Arc;

use msgbridge::host::recording::RecordingHost;
use msgbridge::pipeline::compose::split_chunks;
use msgbridge::pipeline::{ComposeError, ComposeOptions, Session, SessionConfig};
use msgbridge::protocol::loopback::LoopbackProtocol;
use msgbridge_proto::peer::PeerId;
use proptest::prelude::*;

/// Strategy for chunk geometry: (chunk size, chunk count).
fn arb_geometry() -> impl Strategy<Value = (usize, usize)> {
    (1usize..16, 1usize..6)
}

/// Strategy for text mixing ASCII, multi-byte and astral code points.
fn arb_text() -> impl Strategy<Value = String> {
    "[a-z ä€😀\n]{0,120}"
}

proptest! {
    #[test]
    fn chunks_concatenate_to_original((size, count) in arb_geometry(), text in arb_text()) {
        let length = text.chars().count();
        prop_assume!(length <= size * count);

        let chunks = split_chunks(&text, size, count).unwrap();
        prop_assert_eq!(chunks.concat(), text.clone());
        prop_assert!(chunks.len() <= count);
        for (index, chunk) in chunks.iter().enumerate() {
            let chars = chunk.chars().count();
            prop_assert!((1..=size).contains(&chars));
            if index + 1 < chunks.len() {
                prop_assert_eq!(chars, size);
            }
        }
    }

    #[test]
    fn over_length_is_rejected_without_sends((size, count) in arb_geometry(), text in arb_text()) {
        let length = text.chars().count();
        prop_assume!(length > size * count);

        prop_assert_eq!(
            split_chunks(&text, size, count),
            Err(ComposeError::OverLength { length, limit: size * count })
        );

        let protocol = Arc::new(LoopbackProtocol::new(std::env::temp_dir()));
        let config = SessionConfig {
            own_id: PeerId::user(1),
            compose: ComposeOptions {
                max_chunk_size: size,
                max_chunk_count: count,
                normalize_markup: false,
            },
        };
        let mut session = Session::new(Arc::clone(&protocol), RecordingHost::new(), config);
        prop_assert!(session.send_message(PeerId::user(2), &text).is_err());
        prop_assert_eq!(session.in_flight(), 0);
        prop_assert!(protocol.calls().is_empty());
    }
}
