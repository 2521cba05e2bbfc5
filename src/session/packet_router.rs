//! Routes datagrams from the ICE thread to the channels.
//!
//! Runs on the engine's callback thread, so every path here is a table
//! lookup followed by a non-blocking hand-off.

use std::{
    collections::HashMap,
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, Ordering},
        mpsc::Sender,
    },
    time::Instant,
};

use super::packet_classifier::{PacketClass, classify};
use crate::{
    channel::{MediaKind, ReceiveHandle, SendControl, SendHandle},
    congestion_controller::ControllerInput,
    log::log_sink::LogSink,
    rtcp::{RtcpPacket, report_block::ReportBlock},
    rtp::time::compact_now,
    sink_debug, sink_trace, sink_warn,
};

/// Lookup tables built once negotiation is complete.
#[derive(Default)]
pub struct Routes {
    /// Negotiated payload type (FEC included) to receive channel.
    pub receive_by_pt: HashMap<u8, ReceiveHandle>,
    /// Local media SSRC to send channel, for report blocks and NACKs.
    pub send_by_ssrc: HashMap<u32, SendHandle>,
    /// Remote SSRCs announced in the remote description.
    pub remote_ssrcs: HashMap<u32, MediaKind>,
    pub controller: Option<Sender<ControllerInput>>,
}

impl Routes {
    fn receiver_for(&self, media: MediaKind) -> Option<&ReceiveHandle> {
        self.receive_by_pt.values().find(|h| h.media() == media)
    }
}

pub struct PacketRouter {
    closed: AtomicBool,
    routes: RwLock<Option<Routes>>,
    logger: Arc<dyn LogSink>,
}

impl PacketRouter {
    pub fn new(logger: Arc<dyn LogSink>) -> Self {
        Self {
            closed: AtomicBool::new(false),
            routes: RwLock::new(None),
            logger,
        }
    }

    pub fn install(&self, routes: Routes) {
        match self.routes.write() {
            Ok(mut g) => *g = Some(routes),
            Err(_) => sink_warn!(self.logger, "[Router] routes lock poisoned"),
        }
    }

    /// Later datagrams and ICE callbacks become no-ops.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Ok(mut g) = self.routes.write() {
            *g = None;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn route(&self, bytes: &[u8]) {
        if self.is_closed() {
            return;
        }
        let Ok(guard) = self.routes.read() else {
            return;
        };
        let Some(routes) = guard.as_ref() else {
            sink_trace!(self.logger, "[Router] {} bytes before negotiation, dropped", bytes.len());
            return;
        };

        match classify(bytes) {
            PacketClass::Rtp { payload_type, ssrc } => match routes.receive_by_pt.get(&payload_type) {
                Some(rx) => rx.deliver(bytes.to_vec()),
                None => sink_debug!(
                    self.logger,
                    "[Router] RTP pt={} ssrc={:#010x} not negotiated, dropped",
                    payload_type,
                    ssrc
                ),
            },
            PacketClass::Rtcp => self.route_rtcp(routes, bytes),
            PacketClass::Unknown => {
                sink_debug!(self.logger, "[Router] unclassified datagram of {} bytes", bytes.len());
            }
        }
    }

    fn route_rtcp(&self, routes: &Routes, bytes: &[u8]) {
        let pkts = match RtcpPacket::decode_compound_lenient(bytes) {
            Ok(p) => p,
            Err(e) => {
                sink_debug!(self.logger, "[Router] malformed RTCP: {}", e);
                return;
            }
        };
        let arrival_compact = compact_now();
        for pkt in pkts {
            match pkt {
                RtcpPacket::Sr(sr) => {
                    let rx = routes
                        .remote_ssrcs
                        .get(&sr.ssrc)
                        .and_then(|&m| routes.receiver_for(m))
                        .or_else(|| {
                            routes
                                .receive_by_pt
                                .values()
                                .find(|h| h.remote_ssrc() == Some(sr.ssrc))
                        });
                    match rx {
                        Some(rx) => {
                            if let Err(e) = rx.on_sender_report(&sr, arrival_compact) {
                                sink_warn!(self.logger, "[Router] SR not recorded: {}", e);
                            }
                        }
                        None => sink_debug!(self.logger, "[Router] SR from unknown ssrc={:#010x}", sr.ssrc),
                    }
                    self.route_report_blocks(routes, &sr.reports, arrival_compact);
                }
                RtcpPacket::Rr(rr) => self.route_report_blocks(routes, &rr.reports, arrival_compact),
                RtcpPacket::Ccfb(fb) => {
                    if let Some(ctl) = &routes.controller {
                        let _ = ctl.send(ControllerInput::Feedback(fb, Instant::now()));
                    }
                }
                RtcpPacket::Nack(nack) => match routes.send_by_ssrc.get(&nack.media_ssrc) {
                    Some(tx) => {
                        tx.post(SendControl::Nack(nack.lost_sequence_numbers()));
                    }
                    None => sink_debug!(
                        self.logger,
                        "[Router] NACK for unknown ssrc={:#010x}",
                        nack.media_ssrc
                    ),
                },
            }
        }
    }

    fn route_report_blocks(&self, routes: &Routes, blocks: &[ReportBlock], arrival_compact: u32) {
        for block in blocks {
            let Some(tx) = routes.send_by_ssrc.get(&block.ssrc) else {
                continue;
            };
            tx.post(SendControl::ReportBlock {
                block: block.clone(),
                arrival_compact,
            });
            // The send side's last RTT paces NACKs on the receive side.
            if let (Some(rtt), Some(rx)) = (tx.rtt(), routes.receiver_for(tx.media)) {
                let _ = rx.set_rtt(rtt);
            }
        }
    }
}
