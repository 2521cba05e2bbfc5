//! RTCP packets built byte by byte and fed to the compound decoder.
#![allow(clippy::unwrap_used)]

use byteorder::{BigEndian, WriteBytesExt};
use deskrtc::rtcp::{
    CongestionControlFeedback, Ecn, GenericNack, PacketReport, ReceiverReport, ReportBlock, RtcpError,
    RtcpPacket, SenderInfo, SenderReport, StreamFeedback,
};
use deskrtc::rtp::time::NtpTime;
use proptest::prelude::*;

/// Common header followed by `body`; the length field is filled in.
fn packet(count_or_fmt: u8, pt: u8, body: &[u8]) -> Vec<u8> {
    assert_eq!(body.len() % 4, 0);
    let mut out = Vec::new();
    out.write_u8(0x80 | count_or_fmt).unwrap();
    out.write_u8(pt).unwrap();
    out.write_u16::<BigEndian>((body.len() / 4) as u16).unwrap();
    out.extend_from_slice(body);
    out
}

fn report_block(ssrc: u32, fraction: u8, cumulative: i32, highest: u32, jitter: u32, lsr: u32, dlsr: u32) -> Vec<u8> {
    let mut b = Vec::new();
    b.write_u32::<BigEndian>(ssrc).unwrap();
    b.write_u8(fraction).unwrap();
    b.write_i24::<BigEndian>(cumulative).unwrap();
    b.write_u32::<BigEndian>(highest).unwrap();
    b.write_u32::<BigEndian>(jitter).unwrap();
    b.write_u32::<BigEndian>(lsr).unwrap();
    b.write_u32::<BigEndian>(dlsr).unwrap();
    b
}

fn sender_report() -> Vec<u8> {
    let mut body = Vec::new();
    body.write_u32::<BigEndian>(0xAABB_CCDD).unwrap();
    body.write_u32::<BigEndian>(0xE000_0001).unwrap(); // NTP msw
    body.write_u32::<BigEndian>(0x8000_0000).unwrap(); // NTP lsw
    body.write_u32::<BigEndian>(90_000).unwrap();
    body.write_u32::<BigEndian>(42).unwrap();
    body.write_u32::<BigEndian>(42_000).unwrap();
    body.extend(report_block(0x1111_2222, 64, -3, 0x0001_0010, 17, 0x1234_5678, 0x0000_8000));
    packet(1, 200, &body)
}

fn nack() -> Vec<u8> {
    let mut body = Vec::new();
    body.write_u32::<BigEndian>(1).unwrap();
    body.write_u32::<BigEndian>(0x1111_2222).unwrap();
    body.write_u16::<BigEndian>(65_534).unwrap();
    body.write_u16::<BigEndian>(0b101).unwrap();
    packet(1, 205, &body)
}

fn ccfb() -> Vec<u8> {
    let mut body = Vec::new();
    body.write_u32::<BigEndian>(7).unwrap();
    body.write_u32::<BigEndian>(0x1111_2222).unwrap();
    body.write_u16::<BigEndian>(100).unwrap();
    body.write_u16::<BigEndian>(3).unwrap();
    body.write_u16::<BigEndian>(0x8000 | 0x0010).unwrap(); // received, ato 16
    body.write_u16::<BigEndian>(0).unwrap(); // lost
    body.write_u16::<BigEndian>(0x8000 | (0b11 << 13) | 0x1FFF).unwrap(); // CE, no ato
    body.write_u16::<BigEndian>(0).unwrap(); // padding
    body.write_u32::<BigEndian>(0xCAFE_0000).unwrap();
    packet(11, 205, &body)
}

#[test]
fn hand_built_compound_decodes_field_by_field() {
    let mut buf = sender_report();
    buf.extend(nack());
    buf.extend(ccfb());

    let pkts = RtcpPacket::decode_compound(&buf).unwrap();
    assert_eq!(pkts.len(), 3);

    let RtcpPacket::Sr(sr) = &pkts[0] else {
        panic!("expected SR, got {:?}", pkts[0]);
    };
    assert_eq!(sr.ssrc, 0xAABB_CCDD);
    assert_eq!(sr.info.ntp.0, 0xE000_0001_8000_0000);
    assert_eq!(sr.info.packet_count, 42);
    let rb = &sr.reports[0];
    assert_eq!(rb.ssrc, 0x1111_2222);
    assert_eq!(rb.cumulative_lost, -3);
    assert_eq!(rb.highest_seq_no_received, 0x0001_0010);
    assert_eq!(rb.dlsr, 0x8000);

    let RtcpPacket::Nack(nack) = &pkts[1] else {
        panic!("expected NACK, got {:?}", pkts[1]);
    };
    assert_eq!(nack.lost_sequence_numbers(), vec![65_534, 65_535, 1]);

    let RtcpPacket::Ccfb(fb) = &pkts[2] else {
        panic!("expected CCFB, got {:?}", pkts[2]);
    };
    assert_eq!(fb.report_timestamp, 0xCAFE_0000);
    let reports = &fb.blocks[0].reports;
    assert_eq!(reports.len(), 3);
    assert_eq!(reports[0].arrival_time_offset, Some(16));
    assert!(!reports[1].received);
    assert!(reports[2].received);
    assert_eq!(reports[2].arrival_time_offset, None);
}

#[test]
fn encoder_output_matches_hand_built_bytes() {
    let built = sender_report();
    let decoded = RtcpPacket::decode_compound(&built).unwrap();
    assert_eq!(RtcpPacket::encode_compound(&decoded).unwrap(), built);

    let built = ccfb();
    let decoded = RtcpPacket::decode_compound(&built).unwrap();
    assert_eq!(RtcpPacket::encode_compound(&decoded).unwrap(), built);
}

#[test]
fn length_field_past_the_buffer_is_malformed() {
    let mut buf = nack();
    buf[3] += 1;
    let err = RtcpPacket::decode_compound(&buf).unwrap_err();
    assert!(err.is_malformed(), "{err:?}");
}

#[test]
fn unknown_packet_types_are_skipped_only_by_the_lenient_decoder() {
    let mut buf = packet(0, 202, &[0, 0, 0, 9]); // SDES
    buf.extend(nack());
    assert!(matches!(
        RtcpPacket::decode_compound(&buf),
        Err(RtcpError::UnknownPacketType(202))
    ));
    let pkts = RtcpPacket::decode_compound_lenient(&buf).unwrap();
    assert_eq!(pkts.len(), 1);
    assert!(matches!(pkts[0], RtcpPacket::Nack(_)));
}

fn report_block_strategy() -> impl Strategy<Value = ReportBlock> {
    (
        any::<u32>(),
        any::<u8>(),
        -(1i32 << 23)..(1i32 << 23),
        any::<u32>(),
        any::<u32>(),
        any::<u32>(),
        any::<u32>(),
    )
        .prop_map(|(ssrc, fraction_lost, cumulative_lost, highest, jitter, lsr, dlsr)| ReportBlock {
            ssrc,
            fraction_lost,
            cumulative_lost,
            highest_seq_no_received: highest,
            interarrival_jitter: jitter,
            lsr,
            dlsr,
        })
}

/// Profile extensions are whole 32-bit words.
fn profile_ext() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u32>(), 0..3)
        .prop_map(|words| words.iter().flat_map(|w| w.to_be_bytes()).collect())
}

fn receiver_report() -> impl Strategy<Value = RtcpPacket> {
    (any::<u32>(), prop::collection::vec(report_block_strategy(), 0..=31), profile_ext()).prop_map(
        |(ssrc, reports, profile_ext)| {
            RtcpPacket::Rr(ReceiverReport {
                ssrc,
                reports,
                profile_ext,
            })
        },
    )
}

fn sender_report_strategy() -> impl Strategy<Value = RtcpPacket> {
    (
        any::<u32>(),
        (any::<u64>(), any::<u32>(), any::<u32>(), any::<u32>()),
        prop::collection::vec(report_block_strategy(), 0..=31),
        profile_ext(),
    )
        .prop_map(|(ssrc, (ntp, rtp_ts, packet_count, octet_count), reports, profile_ext)| {
            let info = SenderInfo {
                ntp: NtpTime(ntp),
                rtp_ts,
                packet_count,
                octet_count,
            };
            RtcpPacket::Sr(SenderReport {
                ssrc,
                info,
                reports,
                profile_ext,
            })
        })
}

fn generic_nack() -> impl Strategy<Value = RtcpPacket> {
    (
        any::<u32>(),
        any::<u32>(),
        prop::collection::vec((any::<u16>(), any::<u16>()), 0..20),
    )
        .prop_map(|(sender, media, entries)| RtcpPacket::Nack(GenericNack::new(sender, media, entries)))
}

fn packet_report(seq: u16, metric: (bool, u8, Option<u16>)) -> PacketReport {
    let (received, ecn, ato) = metric;
    if !received {
        return PacketReport::lost(seq);
    }
    let ecn = match ecn % 4 {
        0 => Ecn::NotEct,
        1 => Ecn::Ect1,
        2 => Ecn::Ect0,
        _ => Ecn::Ce,
    };
    PacketReport::received(seq, ato, ecn)
}

fn stream_feedback() -> impl Strategy<Value = StreamFeedback> {
    (
        any::<u32>(),
        any::<u16>(),
        prop::collection::vec((any::<bool>(), any::<u8>(), prop::option::of(0u16..0x1FFF)), 0..40),
    )
        .prop_map(|(ssrc, begin, metrics)| {
            let reports = metrics
                .into_iter()
                .enumerate()
                .map(|(i, m)| packet_report(begin.wrapping_add(i as u16), m))
                .collect();
            StreamFeedback::new(ssrc, reports)
        })
}

fn congestion_feedback() -> impl Strategy<Value = RtcpPacket> {
    (any::<u32>(), prop::collection::vec(stream_feedback(), 0..4), any::<u32>()).prop_map(
        |(sender, blocks, ts)| RtcpPacket::Ccfb(CongestionControlFeedback::new(sender, blocks, ts)),
    )
}

fn any_rtcp_packet() -> impl Strategy<Value = RtcpPacket> {
    prop_oneof![
        sender_report_strategy(),
        receiver_report(),
        generic_nack(),
        congestion_feedback(),
    ]
}

proptest! {
    #[test]
    fn every_packet_kind_survives_encode_and_decode(pkt in any_rtcp_packet()) {
        let bytes = pkt.encode().unwrap();
        prop_assert_eq!(bytes.len() % 4, 0);
        let back = RtcpPacket::decode_compound(&bytes).unwrap();
        prop_assert_eq!(back, vec![pkt]);
    }

    #[test]
    fn compound_packets_keep_their_order(pkts in prop::collection::vec(any_rtcp_packet(), 1..5)) {
        let bytes = RtcpPacket::encode_compound(&pkts).unwrap();
        prop_assert_eq!(RtcpPacket::decode_compound(&bytes).unwrap(), pkts);
    }
}
