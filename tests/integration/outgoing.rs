//! Integration tests for outgoing composition and send-failure reporting.
//!
//! Verifies:
//! 1. Long text is split into ordered, code-point-bounded chunks.
//! 2. Over-length text is rejected with zero sends, attachment included.
//! 3. An embedded image is staged and sent as a document before the text.
//! 4. A staging failure skips the document but still sends the text.
//! 5. Failed sends show a notice in the conversation they were sent to.
//! 6. Plain text from outside the UI goes out unchanged.

use std::sync::Arc;

use msgbridge::host::MessageFlags;
use msgbridge::host::recording::{Delivery, RecordingHost};
use msgbridge::pipeline::{
    ComposeError, ComposeOptions, SEND_FAILED_NOTICE, Session, SessionConfig, Submitted,
};
use msgbridge::protocol::loopback::{LoopbackProtocol, ProtocolCall};
use msgbridge_proto::peer::PeerId;
use tempfile::TempDir;

const OWN: PeerId = PeerId::user(100);
const BOB: PeerId = PeerId::user(2);
const TRIP: PeerId = PeerId::chat(7);
const SECRET: PeerId = PeerId::encrypted_chat(3);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    dir: TempDir,
    protocol: Arc<LoopbackProtocol>,
    session: Session<LoopbackProtocol, RecordingHost>,
}

/// Session with small chunks (5 code points, at most 3 per message) and a
/// host that stages attachments in a temp dir.
fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let protocol = Arc::new(LoopbackProtocol::new(dir.path()));
    let host = RecordingHost::new().with_staging_dir(dir.path());
    let config = SessionConfig {
        own_id: OWN,
        compose: ComposeOptions {
            max_chunk_size: 5,
            max_chunk_count: 3,
            normalize_markup: true,
        },
    };
    let session = Session::new(Arc::clone(&protocol), host, config);
    Harness {
        dir,
        protocol,
        session,
    }
}

fn texts_to(protocol: &LoopbackProtocol, peer: PeerId) -> Vec<String> {
    protocol
        .sent_texts()
        .into_iter()
        .filter(|(to, _)| *to == peer)
        .map(|(_, text)| text)
        .collect()
}

// ---------------------------------------------------------------------------
// Splitting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn long_text_is_sent_as_ordered_chunks() {
    let mut h = harness();
    let submitted = h.session.send_message(BOB, "abcdefghijkl").unwrap();
    assert_eq!(
        submitted,
        Submitted {
            chunks: 3,
            document: false
        }
    );

    h.session.settle().await;
    assert_eq!(texts_to(&h.protocol, BOB), vec!["abcde", "fghij", "kl"]);
    assert!(h.session.host().deliveries().is_empty());
}

#[tokio::test]
async fn chunks_split_on_code_points() {
    let mut h = harness();
    h.session.send_message(BOB, "ääääääö€").unwrap();
    h.session.settle().await;
    assert_eq!(texts_to(&h.protocol, BOB), vec!["äääää", "äö€"]);
}

#[tokio::test]
async fn over_length_text_sends_nothing() {
    let mut h = harness();
    let handle = h.session.host().add_image("cat.png", b"png".to_vec());
    let text = format!("{}<img id=\"{handle}\">", "x".repeat(16));

    let result = h.session.send_message(BOB, &text);
    assert_eq!(
        result,
        Err(ComposeError::OverLength {
            length: 16,
            limit: 15
        })
    );
    assert_eq!(h.session.in_flight(), 0);
    h.session.settle().await;
    assert!(h.protocol.calls().is_empty());
    assert!(!h.dir.path().join("cat.png").exists());
}

#[tokio::test]
async fn text_at_limit_is_sent() {
    let mut h = harness();
    let submitted = h.session.send_message(BOB, &"y".repeat(15)).unwrap();
    assert_eq!(submitted.chunks, 3);
}

#[tokio::test]
async fn markup_is_stripped_and_unescaped() {
    let mut h = harness();
    h.session.send_message(BOB, "<b>a&amp;b</b>").unwrap();
    h.session.settle().await;
    assert_eq!(texts_to(&h.protocol, BOB), vec!["a&b"]);
}

#[tokio::test]
async fn plain_text_is_sent_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let protocol = Arc::new(LoopbackProtocol::new(dir.path()));
    let mut session = Session::new(
        Arc::clone(&protocol),
        RecordingHost::new(),
        SessionConfig::new(OWN),
    );

    let text = "if a < b and c > d";
    let submitted = session.send_plain_text(BOB, text).unwrap();
    assert_eq!(
        submitted,
        Submitted {
            chunks: 1,
            document: false
        }
    );
    session.settle().await;
    assert_eq!(texts_to(&protocol, BOB), vec![text]);
}

#[tokio::test]
async fn plain_text_over_length_sends_nothing() {
    let mut h = harness();
    let result = h.session.send_plain_text(BOB, &"<".repeat(16));
    assert!(matches!(result, Err(ComposeError::OverLength { length: 16, .. })));
    h.session.settle().await;
    assert!(h.protocol.calls().is_empty());
}

// ---------------------------------------------------------------------------
// Embedded images
// ---------------------------------------------------------------------------

#[tokio::test]
async fn embedded_image_is_sent_as_document_before_text() {
    let mut h = harness();
    let handle = h.session.host().add_image("cat.png", b"png".to_vec());

    let submitted = h
        .session
        .send_message(TRIP, &format!("look <IMG ID=\"{handle}\">"))
        .unwrap();
    assert_eq!(
        submitted,
        Submitted {
            chunks: 1,
            document: true
        }
    );
    h.session.settle().await;

    let staged = h.dir.path().join("cat.png");
    assert_eq!(std::fs::read(&staged).unwrap(), b"png");
    assert_eq!(
        h.protocol.calls(),
        vec![
            ProtocolCall::SendDocument {
                to: TRIP,
                path: staged
            },
            ProtocolCall::SendText {
                to: TRIP,
                text: "look ".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn staging_failure_still_sends_text() {
    let dir = tempfile::tempdir().unwrap();
    let protocol = Arc::new(LoopbackProtocol::new(dir.path()));
    let host = RecordingHost::new();
    let handle = host.add_image("cat.png", b"png".to_vec());
    let mut session = Session::new(Arc::clone(&protocol), host, SessionConfig::new(OWN));

    let submitted = session
        .send_message(BOB, &format!("caption <img id=\"{handle}\">"))
        .unwrap();
    assert!(!submitted.document);
    session.settle().await;

    assert!(protocol.sent_documents().is_empty());
    assert_eq!(texts_to(&protocol, BOB), vec!["caption "]);
    assert!(session.host().deliveries().is_empty());
}

#[tokio::test]
async fn image_without_valid_handle_sends_text_only() {
    let mut h = harness();
    h.session.send_message(BOB, "hey <img id=\"0\">").unwrap();
    h.session.settle().await;
    assert!(h.protocol.sent_documents().is_empty());
    assert_eq!(texts_to(&h.protocol, BOB), vec!["hey "]);
}

// ---------------------------------------------------------------------------
// Send failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_chat_send_shows_notice_in_chat() {
    let mut h = harness();
    h.protocol.fail_sends_to(TRIP);
    h.session.send_message(TRIP, "hello").unwrap();
    h.session.settle().await;

    let deliveries = h.session.host().deliveries();
    assert_eq!(deliveries.len(), 1);
    let Delivery::Chat {
        chat,
        sender,
        text,
        flags,
        ..
    } = &deliveries[0]
    else {
        panic!("expected a chat notice, got {:?}", deliveries[0]);
    };
    assert_eq!((*chat, *sender), (TRIP, TRIP));
    assert_eq!(text, SEND_FAILED_NOTICE);
    assert!(flags.contains(MessageFlags::ERROR | MessageFlags::SYSTEM));
}

#[tokio::test]
async fn failed_direct_and_encrypted_sends_show_direct_notices() {
    let mut h = harness();
    h.protocol.fail_sends_to(BOB);
    h.protocol.fail_sends_to(SECRET);
    h.session.send_message(BOB, "one").unwrap();
    h.session.send_message(SECRET, "two").unwrap();
    h.session.settle().await;

    let peers: Vec<PeerId> = h
        .session
        .host()
        .deliveries()
        .iter()
        .map(|d| match d {
            Delivery::Direct { peer, text, .. } => {
                assert_eq!(text, SEND_FAILED_NOTICE);
                *peer
            }
            Delivery::Chat { .. } => panic!("unexpected chat delivery"),
        })
        .collect();
    assert_eq!(peers.len(), 2);
    assert!(peers.contains(&BOB));
    assert!(peers.contains(&SECRET));
}

#[tokio::test]
async fn every_failed_chunk_is_reported_and_none_is_retried() {
    let mut h = harness();
    h.protocol.fail_sends_to(BOB);
    h.session.send_message(BOB, "abcdefgh").unwrap();
    h.session.settle().await;

    assert_eq!(texts_to(&h.protocol, BOB), vec!["abcde", "fgh"]);
    assert_eq!(
        h.session.host().texts(),
        vec![SEND_FAILED_NOTICE, SEND_FAILED_NOTICE]
    );
}

#[tokio::test]
async fn failure_for_one_peer_does_not_affect_another() {
    let mut h = harness();
    h.protocol.fail_sends_to(BOB);
    h.session.send_message(BOB, "x").unwrap();
    h.session.send_message(TRIP, "y").unwrap();
    h.session.settle().await;

    assert_eq!(texts_to(&h.protocol, TRIP), vec!["y"]);
    assert_eq!(h.session.host().deliveries().len(), 1);
}
