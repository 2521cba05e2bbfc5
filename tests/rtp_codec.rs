//! RTP decoding robustness and the packetize -> reorder -> reassemble path.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Instant;

use deskrtc::fec::source_block::SourceBlockBuilder;
use deskrtc::log::NoopLogSink;
use deskrtc::reassembly::{
    DEFAULT_REASSEMBLY_TIMEOUT, FrameAssembler, Fragment, Reassembler, ReassemblyOutcome,
};
use deskrtc::rtp::{ExtensionElement, RtpHeader, RtpHeaderExtension, RtpPacket};
use deskrtc::rtp::payload::PayloadCodec;
use deskrtc::rtp::payload::h264_packetizer::{H264Packetizer, build_annexb};
use proptest::prelude::*;

const SSRC: u32 = 0x5EED_0001;
const PT: u8 = 96;

/// NAL units without zero bytes, so no start code can appear inside them.
fn nal_unit() -> impl Strategy<Value = Vec<u8>> {
    (
        prop::sample::select(vec![0x41u8, 0x65, 0x67, 0x68, 0x06]),
        prop::collection::vec(1u8..=255, 1..900),
    )
        .prop_map(|(header, mut body)| {
            body.insert(0, header);
            body
        })
}

fn extension_element() -> impl Strategy<Value = ExtensionElement> {
    (1u8..=14, prop::collection::vec(any::<u8>(), 1..=16)).prop_map(|(id, data)| ExtensionElement::new(id, data))
}

/// Any packet the encoder accepts: up to 15 CSRCs, an optional one-byte
/// extension block, and 0..=255 padding bytes.
fn rtp_packet() -> impl Strategy<Value = RtpPacket> {
    (
        (0u8..=127, any::<bool>(), any::<u16>(), any::<u32>(), any::<u32>()),
        prop::collection::vec(any::<u32>(), 0..=15),
        prop::option::of(prop::collection::vec(extension_element(), 1..5)),
        prop::collection::vec(any::<u8>(), 0..200),
        any::<u8>(),
    )
        .prop_map(|((pt, marker, seq, ts, ssrc), csrcs, elements, payload, padding)| {
            let ext = elements.map(|els| RtpHeaderExtension::one_byte(&els).unwrap());
            let header = RtpHeader::new(pt, seq, ts, ssrc)
                .with_marker(marker)
                .with_csrcs(csrcs)
                .with_extension(ext);
            let mut pkt = RtpPacket::new(header, payload);
            pkt.padding_bytes = padding;
            pkt
        })
}

/// What the send channel puts on the wire for one frame.
fn wire_packets(frame: &[u8], mtu: usize, first_seq: u16, ts: u32) -> Vec<Vec<u8>> {
    let mut block = SourceBlockBuilder::new();
    H264Packetizer::new(mtu)
        .packetize(frame)
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let offset = block.push(&chunk.bytes);
            RtpPacket::simple(PT, chunk.marker, first_seq.wrapping_add(i as u16), ts, SSRC, chunk.bytes)
                .with_block_offset(offset)
                .encode()
                .unwrap()
        })
        .collect()
}

fn receive(packets: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let sink = Arc::new(NoopLogSink);
    let mut reassembler = Reassembler::new(DEFAULT_REASSEMBLY_TIMEOUT, sink.clone());
    let mut frames = FrameAssembler::new(sink);
    let now = Instant::now();
    let mut out = Vec::new();
    for bytes in packets {
        let pkt = RtpPacket::decode(bytes).unwrap();
        let frag = Fragment::from_packet(&pkt, PayloadCodec::H264).unwrap();
        if let ReassemblyOutcome::Complete(unit) = reassembler.insert(frag, now) {
            if let Some(au) = frames.push(unit, now) {
                out.push(au.data);
            }
        }
    }
    out
}

proptest! {
    #[test]
    fn every_valid_packet_survives_encode_and_decode(pkt in rtp_packet()) {
        let bytes = pkt.encode().unwrap();
        prop_assert_eq!(bytes.len(), pkt.encoded_len());
        let back = RtpPacket::decode(&bytes).unwrap();
        prop_assert_eq!(&back, &pkt);
        if let Some(ext) = &pkt.header.header_extension {
            let sent = ext.elements().unwrap();
            prop_assert_eq!(back.header.header_extension.unwrap().elements().unwrap(), sent);
        }
    }

    #[test]
    fn decode_never_panics_on_arbitrary_bytes(buf in prop::collection::vec(any::<u8>(), 0..256)) {
        if let Err(e) = RtpPacket::decode(&buf) {
            prop_assert!(e.is_malformed());
        }
    }

    #[test]
    fn decode_of_truncated_packet_is_an_error(nal in nal_unit(), cut in 1usize..12) {
        let bytes = RtpPacket::simple(PT, true, 1, 2, SSRC, nal).with_block_offset(0).encode().unwrap();
        let short = &bytes[..cut.min(bytes.len() - 1)];
        prop_assert!(RtpPacket::decode(short).is_err());
    }

    #[test]
    fn shuffled_frame_is_rebuilt_exactly_once(
        nalus in prop::collection::vec(nal_unit(), 1..6),
        first_seq in any::<u16>(),
        ts in any::<u32>(),
        order in any::<prop::sample::Index>(),
    ) {
        let frame = build_annexb(&nalus);
        let mut packets = wire_packets(&frame, 300, first_seq, ts);
        // Rotate so delivery starts mid-frame and wraps around.
        let pivot = order.index(packets.len());
        packets.rotate_left(pivot);

        let rebuilt = receive(&packets);
        prop_assert_eq!(rebuilt.len(), 1);
        prop_assert_eq!(&rebuilt[0], &frame);
    }

    #[test]
    fn a_lost_packet_never_yields_a_frame(
        nalus in prop::collection::vec(nal_unit(), 2..6),
        victim in any::<prop::sample::Index>(),
    ) {
        let frame = build_annexb(&nalus);
        let mut packets = wire_packets(&frame, 300, 65_530, 9_000);
        packets.remove(victim.index(packets.len()));
        prop_assert!(receive(&packets).is_empty());
    }
}
