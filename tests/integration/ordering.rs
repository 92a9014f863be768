//! Integration tests for arrival-order delivery under asynchronous photo
//! downloads.
//!
//! Verifies:
//! 1. Text, photo, text arrive and are shown in that order whether the
//!    photo finishes before or after the later text arrives.
//! 2. Photos finishing in reverse order are still shown in arrival order.
//! 3. A failed download is shown as a notice and does not block the queue.
//! 4. A download that never finishes holds back everything behind it.

use std::sync::Arc;
use std::time::Duration;

use msgbridge::host::MessageFlags;
use msgbridge::host::recording::RecordingHost;
use msgbridge::pipeline::{PHOTO_FAILED_NOTICE, Session, SessionConfig};
use msgbridge::protocol::loopback::{LoopbackProtocol, ProtocolCall};
use msgbridge_proto::message::{InboundMessage, Media, PhotoDescriptor};
use msgbridge_proto::peer::PeerId;
use tempfile::TempDir;
use tokio::sync::mpsc;

const OWN: PeerId = PeerId::user(100);
const ALICE: PeerId = PeerId::user(1);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    _dir: TempDir,
    protocol: Arc<LoopbackProtocol>,
    session: Session<LoopbackProtocol, RecordingHost>,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let protocol = Arc::new(LoopbackProtocol::new(dir.path()));
    protocol.serve_any_photo(b"jpeg".to_vec());
    let session = Session::new(
        Arc::clone(&protocol),
        RecordingHost::new(),
        SessionConfig::new(OWN),
    );
    Harness {
        _dir: dir,
        protocol,
        session,
    }
}

fn text(id: i64) -> InboundMessage {
    InboundMessage::text(id, ALICE, OWN, format!("m{id}"))
}

fn photo(id: i64) -> InboundMessage {
    InboundMessage::text(id, ALICE, OWN, "").with_media(Media::Photo(PhotoDescriptor { id, size: 4 }))
}

/// Shown texts with image tags collapsed to `img`, so tests do not depend
/// on image-store handle numbering.
fn shown(session: &Session<LoopbackProtocol, RecordingHost>) -> Vec<String> {
    session
        .host()
        .texts()
        .into_iter()
        .map(|t| if t.starts_with("<img id=") { "img".to_string() } else { t })
        .collect()
}

// ---------------------------------------------------------------------------
// Ordering under async skew
// ---------------------------------------------------------------------------

#[tokio::test]
async fn photo_finishing_before_next_message_keeps_order() {
    let mut h = harness();
    h.protocol.gate_photo(2);

    h.session.on_message(text(1));
    h.session.on_message(photo(2));
    assert_eq!(shown(&h.session), vec!["m1"]);

    assert!(h.protocol.release_photo(2));
    assert!(h.session.next_completion().await);
    assert_eq!(shown(&h.session), vec!["m1", "img"]);

    h.session.on_message(text(3));
    assert_eq!(shown(&h.session), vec!["m1", "img", "m3"]);
}

#[tokio::test]
async fn later_text_waits_behind_slow_photo() {
    let mut h = harness();
    h.protocol.gate_photo(2);

    h.session.on_message(text(1));
    h.session.on_message(photo(2));
    h.session.on_message(text(3));
    assert_eq!(shown(&h.session), vec!["m1"]);
    assert_eq!(h.session.queued(), 2);

    h.protocol.release_photo(2);
    h.session.settle().await;
    assert_eq!(shown(&h.session), vec!["m1", "img", "m3"]);
    assert_eq!(h.session.queued(), 0);
}

#[tokio::test]
async fn photos_finishing_in_reverse_order_are_shown_in_arrival_order() {
    let mut h = harness();
    h.protocol.gate_photo(1);
    h.protocol.gate_photo(2);

    h.session.on_message(photo(1));
    h.session.on_message(photo(2));
    h.session.on_message(text(3));

    h.protocol.release_photo(2);
    assert!(h.session.next_completion().await);
    assert!(shown(&h.session).is_empty(), "second photo must wait for the first");

    h.protocol.release_photo(1);
    assert!(h.session.next_completion().await);
    assert_eq!(shown(&h.session), vec!["img", "img", "m3"]);
    assert_eq!(h.session.stored_images().len(), 2);
}

#[tokio::test]
async fn run_loop_preserves_order_with_download_latency() {
    let dir = tempfile::tempdir().unwrap();
    let protocol =
        Arc::new(LoopbackProtocol::new(dir.path()).with_latency(Duration::from_millis(20)));
    protocol.serve_any_photo(b"jpeg".to_vec());
    let mut session = Session::new(
        Arc::clone(&protocol),
        RecordingHost::new(),
        SessionConfig::new(OWN),
    );

    let (tx, rx) = mpsc::channel(16);
    let feeder = tokio::spawn(async move {
        for message in [text(1), photo(2), text(3), photo(4), text(5)] {
            tx.send(message).await.unwrap();
        }
    });
    session.run(rx).await;
    feeder.await.unwrap();

    assert_eq!(shown(&session), vec!["m1", "img", "m3", "img", "m5"]);
    assert_eq!(
        protocol
            .calls()
            .iter()
            .filter(|c| matches!(c, ProtocolCall::FetchPhoto(_)))
            .count(),
        2
    );
}

// ---------------------------------------------------------------------------
// Failure and stall behavior
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_download_is_shown_as_notice_and_unblocks_queue() {
    let mut h = harness();
    h.protocol.gate_photo(1);

    h.session.on_message(photo(1));
    h.session.on_message(text(2));
    assert!(h.protocol.fail_photo(1));
    h.session.settle().await;

    assert_eq!(shown(&h.session), vec![PHOTO_FAILED_NOTICE, "m2"]);
    let flags = h.session.host().deliveries()[0].flags();
    assert!(flags.contains(MessageFlags::SYSTEM | MessageFlags::ERROR));
    assert!(h.session.stored_images().is_empty());
}

#[tokio::test]
async fn missing_photo_fails_instead_of_stalling() {
    let dir = tempfile::tempdir().unwrap();
    let protocol = Arc::new(LoopbackProtocol::new(dir.path()));
    let mut session = Session::new(
        Arc::clone(&protocol),
        RecordingHost::new(),
        SessionConfig::new(OWN),
    );

    session.on_message(photo(9));
    session.on_message(text(10));
    session.settle().await;
    assert_eq!(shown(&session), vec![PHOTO_FAILED_NOTICE, "m10"]);
}

#[tokio::test]
async fn download_that_never_finishes_holds_back_later_messages() {
    let mut h = harness();
    h.protocol.gate_photo(1);

    h.session.on_message(photo(1));
    h.session.on_message(text(2));
    h.session.on_message(text(3));

    let waited =
        tokio::time::timeout(Duration::from_millis(20), h.session.next_completion()).await;
    assert!(waited.is_err(), "gated download must not complete");
    assert!(shown(&h.session).is_empty());
    assert_eq!(h.session.queued(), 3);

    h.session.close();
    assert_eq!(h.session.queued(), 0);
    assert!(h.session.host().deliveries().is_empty());
}

#[tokio::test]
async fn each_photo_is_fetched_once() {
    let mut h = harness();
    h.session.on_message(photo(1));
    h.session.on_message(photo(2));
    h.session.settle().await;

    let fetched: Vec<i64> = h
        .protocol
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            ProtocolCall::FetchPhoto(id) => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(fetched, vec![1, 2]);
}
