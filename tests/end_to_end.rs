//! Two negotiators connected over the loopback network and in-memory
//! signaling.
#![allow(clippy::unwrap_used)]

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
    mpsc::{self, Receiver},
};
use std::time::{Duration, Instant};

use deskrtc::{
    channel::MediaKind,
    ice::LoopbackNetwork,
    log::{NoopLogSink, log_sink::LogSink},
    rtp::RtpPacket,
    rtp::payload::h264_packetizer::build_annexb,
    session::{
        ConnectionStatus, NegotiationState, PeerIds, Role, TransportConfig, TransportError, TransportEvent,
        TransportNegotiator,
    },
    signaling::InMemorySignaling,
};

struct Call {
    network: LoopbackNetwork,
    caller: TransportNegotiator,
    caller_events: Receiver<TransportEvent>,
    callee: TransportNegotiator,
    callee_events: Receiver<TransportEvent>,
}

impl Call {
    fn new(caller_config: TransportConfig, callee_config: TransportConfig) -> Self {
        let logger: Arc<dyn LogSink> = Arc::new(NoopLogSink);
        let network = LoopbackNetwork::new();
        let (sa, sb) = InMemorySignaling::pair();
        let (a_tx, caller_events) = mpsc::channel();
        let (b_tx, callee_events) = mpsc::channel();
        let caller = TransportNegotiator::new(
            caller_config,
            Role::Offerer,
            PeerIds::new("call-1", "alice", "bob"),
            Arc::new(sa),
            &network,
            a_tx,
            logger.clone(),
        )
        .unwrap();
        let callee = TransportNegotiator::new(
            callee_config,
            Role::Answerer,
            PeerIds::new("call-1", "bob", "alice"),
            Arc::new(sb),
            &network,
            b_tx,
            logger,
        )
        .unwrap();
        Self {
            network,
            caller,
            caller_events,
            callee,
            callee_events,
        }
    }

    fn pump(&mut self) {
        let _ = self.caller.pump(Duration::from_millis(5));
        let _ = self.callee.pump(Duration::from_millis(5));
    }

    fn connect(&mut self) {
        self.callee.connect().unwrap();
        self.caller.connect().unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.caller.state() != NegotiationState::Active || self.callee.state() != NegotiationState::Active {
            assert!(Instant::now() < deadline, "call did not become active");
            self.pump();
        }
    }

    /// Pumps until the callee reports a frame of `media`.
    fn next_frame(&mut self, media: MediaKind) -> Option<Vec<u8>> {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            self.pump();
            while let Ok(ev) = self.callee_events.try_recv() {
                if let TransportEvent::Frame { media: m, frame } = ev {
                    if m == media {
                        return Some(frame.data);
                    }
                }
            }
        }
        None
    }
}

fn video_frame(seed: u8, len: usize) -> Vec<u8> {
    let idr: Vec<u8> = std::iter::once(0x65)
        .chain((0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed) | 1))
        .collect();
    build_annexb(&[vec![0x67, 0x42, 0x00, 0x1F], vec![0x68, 0xCE, 0x3C, 0x80], idr])
}

#[test]
fn frames_arrive_bit_identical_on_every_media() {
    let mut call = Call::new(TransportConfig::default(), TransportConfig::default());
    call.connect();

    let frame = video_frame(7, 6_000);
    let packets = call.caller.send_video(&frame, 3_000).unwrap();
    assert!(packets > 1);
    assert_eq!(call.next_frame(MediaKind::Video).unwrap(), frame);

    let audio = vec![0xAB; 160];
    call.caller.send_audio(&audio, 960).unwrap();
    assert_eq!(call.next_frame(MediaKind::Audio).unwrap(), audio);

    let data = b"{\"cursor\":[10,20]}".to_vec();
    call.caller.send_data(&data, 1).unwrap();
    assert_eq!(call.next_frame(MediaKind::Data).unwrap(), data);

    // The other direction uses its own channels.
    let back = video_frame(9, 500);
    call.callee.send_video(&back, 90).unwrap();
    let deadline = Instant::now() + Duration::from_secs(3);
    let mut got = None;
    while got.is_none() && Instant::now() < deadline {
        call.pump();
        got = call.caller_events.try_iter().find_map(|ev| match ev {
            TransportEvent::Frame { media: MediaKind::Video, frame } => Some(frame.data),
            _ => None,
        });
    }
    assert_eq!(got.unwrap(), back);
}

#[test]
fn lost_video_packet_is_repaired() {
    let mut call = Call::new(TransportConfig::default(), TransportConfig::default());
    call.connect();

    // Drop the second media packet of the next video frame, once.
    let dropped = Arc::new(AtomicBool::new(false));
    let seen = Arc::new(AtomicUsize::new(0));
    {
        let (dropped, seen) = (dropped.clone(), seen.clone());
        call.network.set_drop_filter(move |_, bytes| {
            let Ok(pkt) = RtpPacket::decode(bytes) else {
                return false;
            };
            if pkt.payload_type() != 96 || pkt.timestamp() != 6_000 {
                return false;
            }
            seen.fetch_add(1, Ordering::SeqCst) == 1 && !dropped.swap(true, Ordering::SeqCst)
        });
    }

    let frame = video_frame(3, 8_000);
    call.caller.send_video(&frame, 6_000).unwrap();
    assert_eq!(call.next_frame(MediaKind::Video).unwrap(), frame);
    assert!(dropped.load(Ordering::SeqCst));
}

#[test]
fn send_before_negotiation_is_not_ready() {
    let mut call = Call::new(TransportConfig::default(), TransportConfig::default());
    let err = call.caller.send_video(&video_frame(1, 10), 0).unwrap_err();
    assert!(matches!(err, TransportError::TransportNotReady(_)));
    call.caller.close();
    assert!(matches!(
        call.caller.send_video(&video_frame(1, 10), 0),
        Err(TransportError::Closed)
    ));
}

#[test]
fn media_without_common_codec_fails_negotiation() {
    let caller_config = TransportConfig {
        media: vec![MediaKind::Video],
        ..TransportConfig::default()
    };
    let mut call = Call::new(caller_config, TransportConfig::default());
    call.callee.connect().unwrap();
    call.caller.connect().unwrap();

    let deadline = Instant::now() + Duration::from_secs(3);
    while call.callee.state() != NegotiationState::Closed && Instant::now() < deadline {
        call.pump();
    }
    assert_eq!(call.callee.state(), NegotiationState::Closed);

    let events: Vec<TransportEvent> = call.callee_events.try_iter().collect();
    assert!(events.iter().any(|e| matches!(e, TransportEvent::Error(msg) if msg.contains("audio"))));
    assert!(events.contains(&TransportEvent::Status(ConnectionStatus::Failed)));
    assert!(matches!(
        call.callee.send_video(&video_frame(1, 10), 0),
        Err(TransportError::Closed)
    ));
}
