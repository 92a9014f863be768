//! Property-based tests for arrival-order dispatch.
//!
//! For any mix of text and photo messages and any order in which the photo
//! downloads finish, everything shown after each completion is a prefix of
//! the arrival sequence, and it is the longest prefix whose photos are all
//! downloaded.

use std::collections::BTreeSet;
use std::sync::Arc;

use msgbridge::host::recording::RecordingHost;
use msgbridge::pipeline::{Session, SessionConfig};
use msgbridge::protocol::loopback::LoopbackProtocol;
use msgbridge_proto::message::{InboundMessage, Media, PhotoDescriptor};
use msgbridge_proto::peer::PeerId;
use proptest::prelude::*;

const OWN: PeerId = PeerId::user(100);
const ALICE: PeerId = PeerId::user(1);

/// Strategy for an arrival sequence (`true` = photo) and a download
/// completion order over the photo positions.
fn arb_schedule() -> impl Strategy<Value = (Vec<bool>, Vec<usize>)> {
    prop::collection::vec(any::<bool>(), 1..12).prop_flat_map(|kinds| {
        let photos: Vec<usize> = kinds
            .iter()
            .enumerate()
            .filter_map(|(index, is_photo)| is_photo.then_some(index))
            .collect();
        (Just(kinds), Just(photos).prop_shuffle())
    })
}

fn message(index: usize, is_photo: bool) -> InboundMessage {
    let id = i64::try_from(index).unwrap();
    let message = InboundMessage::text(id, ALICE, OWN, format!("m{index}"));
    if is_photo {
        message.with_media(Media::Photo(PhotoDescriptor { id, size: 4 }))
    } else {
        message
    }
}

/// Whether a shown text is what arrival `index` renders to.
fn renders(text: &str, index: usize, is_photo: bool) -> bool {
    if is_photo {
        text.starts_with("<img id=")
    } else {
        text == format!("m{index}")
    }
}

/// Length of the longest arrival prefix with every photo downloaded.
fn ready_prefix(kinds: &[bool], downloaded: &BTreeSet<usize>) -> usize {
    kinds
        .iter()
        .enumerate()
        .position(|(index, is_photo)| *is_photo && !downloaded.contains(&index))
        .unwrap_or(kinds.len())
}

fn assert_prefix(session: &Session<LoopbackProtocol, RecordingHost>, kinds: &[bool], expected: usize) {
    let shown = session.host().texts();
    assert_eq!(shown.len(), expected, "shown {shown:?}");
    for (index, text) in shown.iter().enumerate() {
        assert!(renders(text, index, kinds[index]), "position {index} shows {text:?}");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn shown_messages_are_always_an_arrival_prefix((kinds, completion_order) in arb_schedule()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let protocol = Arc::new(LoopbackProtocol::new(dir.path()));
            protocol.serve_any_photo(b"jpeg".to_vec());
            for &index in &completion_order {
                protocol.gate_photo(i64::try_from(index).unwrap());
            }
            let mut session =
                Session::new(Arc::clone(&protocol), RecordingHost::new(), SessionConfig::new(OWN));

            let mut downloaded = BTreeSet::new();
            for (index, &is_photo) in kinds.iter().enumerate() {
                session.on_message(message(index, is_photo));
                assert_prefix(&session, &kinds[..=index], ready_prefix(&kinds[..=index], &downloaded));
            }

            for &index in &completion_order {
                assert!(protocol.release_photo(i64::try_from(index).unwrap()));
                assert!(session.next_completion().await);
                downloaded.insert(index);
                assert_prefix(&session, &kinds, ready_prefix(&kinds, &downloaded));
            }

            assert_eq!(session.queued(), 0);
            assert_eq!(session.in_flight(), 0);
        });
    }
}
