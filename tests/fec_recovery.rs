//! Repair symbols rebuild lost media payloads of a frame.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use deskrtc::fec::{
    CauchyBlockCodec, FEC_PAYLOAD_TYPE, FecConfig, FecEncoder, FecError, FecReceiver,
    source_block::SourceBlockBuilder,
};
use deskrtc::rtp::RtpPacket;
use proptest::prelude::*;

const TS: u32 = 3_000;

struct Frame {
    payloads: Vec<Vec<u8>>,
    offsets: Vec<u32>,
    block: Vec<u8>,
}

fn frame(payloads: Vec<Vec<u8>>) -> Frame {
    let mut builder = SourceBlockBuilder::new();
    let offsets = payloads.iter().map(|p| builder.push(p)).collect();
    Frame {
        payloads,
        offsets,
        block: builder.finish(),
    }
}

fn codec() -> Arc<CauchyBlockCodec> {
    Arc::new(CauchyBlockCodec::new())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// At code rate 1/2 there are as many repair symbols as source symbols,
    /// so any loss pattern among the media packets is recoverable.
    #[test]
    fn half_rate_recovers_any_loss_pattern(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..300), 1..16),
        lost_mask in any::<u16>(),
        base_seq in any::<u16>(),
    ) {
        let f = frame(payloads);
        let enc = FecEncoder::new(FecConfig::new(0.5, 128).unwrap(), codec());
        let repairs = enc.encode(&f.block, base_seq).unwrap();

        let now = Instant::now();
        let mut rx = FecReceiver::new(codec());
        let mut lost = Vec::new();
        for (i, p) in f.payloads.iter().enumerate() {
            if lost_mask & (1 << i) != 0 {
                lost.push(i);
            } else {
                rx.on_media(TS, f.offsets[i], p, now);
            }
        }
        for r in &repairs {
            rx.on_repair(TS, &r.to_payload(), now).unwrap();
        }

        let recovered = rx.recover(TS).unwrap();
        prop_assert_eq!(recovered.len(), lost.len());
        for (r, &i) in recovered.iter().zip(&lost) {
            prop_assert_eq!(&r.payload, &f.payloads[i]);
            prop_assert_eq!(r.block_offset, f.offsets[i]);
            prop_assert_eq!(r.sequence_number, base_seq.wrapping_add(i as u16));
            prop_assert_eq!(r.last, i + 1 == f.payloads.len());
        }
        prop_assert_eq!(rx.session_count(), 0);
    }
}

#[test]
fn too_few_symbols_keeps_the_session_for_later_repairs() {
    let f = frame((0..8u8).map(|i| vec![i; 200]).collect());
    let enc = FecEncoder::new(FecConfig::new(0.8, 256).unwrap(), codec());
    let repairs = enc.encode(&f.block, 10).unwrap();
    assert!(!repairs.is_empty());

    let now = Instant::now();
    let mut rx = FecReceiver::new(codec());
    // Only the first payload and one repair: far from enough.
    rx.on_media(TS, f.offsets[0], &f.payloads[0], now);
    rx.on_repair(TS, &repairs[0].to_payload(), now).unwrap();
    assert!(rx.has_repairs(TS));
    assert!(matches!(rx.recover(TS), Err(FecError::Unrecoverable { .. })));
    assert_eq!(rx.session_count(), 1);

    // Every other media packet turns up late; the block now completes.
    for i in 1..f.payloads.len() - 1 {
        rx.on_media(TS, f.offsets[i], &f.payloads[i], now);
    }
    let recovered = rx.recover(TS).unwrap();
    assert_eq!(recovered.len(), 1);
    assert!(recovered[0].last);
    assert_eq!(recovered[0].payload, f.payloads[7]);
}

#[test]
fn corrupt_repair_header_is_rejected() {
    let f = frame(vec![vec![1; 100], vec![2; 100]]);
    let enc = FecEncoder::new(FecConfig::default(), codec());
    let repairs = enc.encode(&f.block, 0).unwrap();
    let mut rx = FecReceiver::new(codec());
    let now = Instant::now();
    assert!(rx.on_repair(TS, &repairs[0].to_payload()[..5], now).is_err());

    let mut wrong_size = repairs[0].to_payload();
    wrong_size.push(0);
    assert!(matches!(
        rx.on_repair(TS, &wrong_size, now),
        Err(FecError::SymbolSizeMismatch { .. })
    ));
}

#[test]
fn blocks_expire_after_the_window() {
    let f = frame(vec![vec![9; 50]]);
    let enc = FecEncoder::new(FecConfig::default(), codec());
    let repairs = enc.encode(&f.block, 0).unwrap();
    let start = Instant::now();
    let mut rx = FecReceiver::new(codec()).with_window(Duration::from_millis(100));
    rx.on_repair(TS, &repairs[0].to_payload(), start).unwrap();
    assert!(rx.evict_expired(start + Duration::from_millis(50)).is_empty());
    assert_eq!(rx.evict_expired(start + Duration::from_millis(150)), vec![TS]);
    assert_eq!(rx.session_count(), 0);
}

#[test]
fn repair_packets_fit_a_small_mtu() {
    let mtu = 600;
    let f = frame((0..5u8).map(|i| vec![i; 580]).collect());
    let enc = FecEncoder::new(FecConfig::default().fit_mtu(mtu), codec());
    let repairs = enc.encode(&f.block, 0).unwrap();
    assert!(!repairs.is_empty());
    for (i, r) in repairs.iter().enumerate() {
        let pkt = RtpPacket::simple(FEC_PAYLOAD_TYPE, false, i as u16, TS, 9, r.to_payload());
        assert!(pkt.encode().unwrap().len() <= mtu);
    }
}
