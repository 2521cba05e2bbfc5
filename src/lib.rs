//! DeskRTC is the real-time transport layer of a peer-to-peer desktop
//! streaming app.
//!
//! It moves encoded video, audio and data frames between two peers over
//! RTP on a single ICE-selected UDP path, with:
//! - frame packetization and reassembly,
//! - Reed-Solomon FEC and NACK retransmission for video,
//! - transport-wide congestion control driving the encoder bitrate,
//! - SDP offer/answer over a pluggable signaling transport.
//!
//! [`session::TransportNegotiator`] is the entry point; the demo binary
//! `loopback_call` wires two of them together in one process.

/// Per-media send and receive pipelines.
pub mod channel;
/// Handles configuration loading and management.
pub mod config;
/// Delay- and loss-based bandwidth estimation.
pub mod congestion_controller;
/// Block forward error correction over RTP packets.
pub mod fec;
/// ICE engine seam, credentials, candidates and the in-process loopback.
pub mod ice;
/// Logging utilities.
pub mod log;
/// Codec traits and encoder glue.
pub mod media;
/// Reorders packets and rebuilds frames.
pub mod reassembly;
/// RTCP packet parsing and building.
pub mod rtcp;
/// RTP packet parsing, building and payload formats.
pub mod rtp;
/// SDP parsing and building.
pub mod sdp;
/// Negotiation, routing and lifecycle of one peer connection.
pub mod session;
/// Signaling envelopes and transports.
pub mod signaling;
