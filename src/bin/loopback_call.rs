//! Runs a caller and a callee in one process over the loopback network and
//! streams a synthetic video feed between them, printing each statistics
//! sample as it arrives.
//!
//! Usage: `loopback_call [config-file]`. Besides the usual `[Transport]`,
//! `[Ice]` and `[Logging]` keys, `[Demo]` understands `frames` and
//! `loss_percent`.

use std::{
    env,
    sync::{
        Arc,
        mpsc::{self, Receiver},
    },
    thread,
    time::{Duration, Instant},
};

use deskrtc::{
    channel::MediaKind,
    config::Config,
    congestion_controller::BandwidthEstimate,
    ice::LoopbackNetwork,
    log::{log_sink::LogSink, logger::Logger},
    media::{Decoder, EncoderSettings, EncodingSender, TestPatternDecoder, TestPatternEncoder, VideoFrame},
    session::{NegotiationState, PeerIds, Role, TransportConfig, TransportEvent, TransportNegotiator},
    signaling::InMemorySignaling,
    sink_error, sink_info, sink_warn,
};
use rand::Rng;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_FRAMES: u32 = 150;

fn main() {
    let config = match env::args().nth(1) {
        Some(path) => Config::load(&path).unwrap_or_else(|e| {
            eprintln!("Error loading config {path}: {e}. Using defaults.");
            Config::empty()
        }),
        None => Config::load("deskrtc.conf").unwrap_or_else(|_| Config::empty()),
    };
    let logger = Logger::from_config(&config);
    let sink: Arc<dyn LogSink> = Arc::new(logger.handle());
    println!("Logging to {}", logger.file_path().display());

    let transport = TransportConfig::from_config(&config, &sink);
    let frames: u32 = config
        .get_parsed("Demo", "frames")
        .ok()
        .flatten()
        .unwrap_or(DEFAULT_FRAMES);
    let loss_percent: f64 = config
        .get_parsed("Demo", "loss_percent")
        .ok()
        .flatten()
        .unwrap_or(0.0);

    if let Err(e) = run(transport, frames, loss_percent, &sink) {
        sink_error!(sink, "[Demo] {}", e);
        eprintln!("loopback call failed: {e}");
        std::process::exit(1);
    }
}

fn run(transport: TransportConfig, frames: u32, loss_percent: f64, sink: &Arc<dyn LogSink>) -> Result<(), String> {
    let network = LoopbackNetwork::new();
    if loss_percent > 0.0 {
        let p = (loss_percent / 100.0).clamp(0.0, 1.0);
        network.set_drop_filter(move |_, _| rand::thread_rng().r#gen::<f64>() < p);
        sink_info!(sink, "[Demo] dropping {:.1}% of media datagrams", loss_percent);
    }
    let (sig_a, sig_b) = InMemorySignaling::pair();
    let (caller_tx, caller_events) = mpsc::channel();
    let (callee_tx, callee_events) = mpsc::channel();

    let mut caller = TransportNegotiator::new(
        transport.clone(),
        Role::Offerer,
        PeerIds::new("demo", "caller", "callee"),
        Arc::new(sig_a),
        &network,
        caller_tx,
        sink.clone(),
    )
    .map_err(|e| e.to_string())?;
    let mut callee = TransportNegotiator::new(
        transport.clone(),
        Role::Answerer,
        PeerIds::new("demo", "callee", "caller"),
        Arc::new(sig_b),
        &network,
        callee_tx,
        sink.clone(),
    )
    .map_err(|e| e.to_string())?;

    callee.connect().map_err(|e| e.to_string())?;
    caller.connect().map_err(|e| e.to_string())?;

    let deadline = Instant::now() + CONNECT_TIMEOUT;
    while caller.state() != NegotiationState::Active || callee.state() != NegotiationState::Active {
        if Instant::now() > deadline {
            return Err(format!(
                "not connected after {:?} (caller {}, callee {})",
                CONNECT_TIMEOUT,
                caller.state(),
                callee.state()
            ));
        }
        caller.pump(Duration::from_millis(10)).map_err(|e| e.to_string())?;
        callee.pump(Duration::from_millis(10)).map_err(|e| e.to_string())?;
    }
    println!("Connected ({} / {})", caller.ice_state(), callee.ice_state());

    let mut video = EncodingSender::new(
        TestPatternEncoder::new(EncoderSettings::for_bitrate(transport.congestion.start_bitrate_bps)),
        MediaKind::Video,
        sink.clone(),
    );
    let mut decoder = TestPatternDecoder;
    let mut summary = Summary::default();

    for n in 0..frames {
        let fps = video.settings().map_or(30, |s| s.fps);
        let frame = VideoFrame::synthetic(160, 120, n as u8);
        match video.send(&frame, &caller) {
            Ok(_) => summary.sent += 1,
            Err(e) if e.is_transient() => sink_warn!(sink, "[Demo] frame {} skipped: {}", n, e),
            Err(e) => return Err(e.to_string()),
        }
        let _ = caller.pump(Duration::ZERO);
        let _ = callee.pump(Duration::ZERO);
        drain(&caller_events, &mut summary, "caller", |est| {
            video.on_estimate(est);
        });
        drain(&callee_events, &mut summary, "callee", |_| {});
        decode_frames(&mut summary, &mut decoder, sink);
        thread::sleep(Duration::from_millis(1000 / u64::from(fps.max(1))));
    }

    // Let the last frames and reports land.
    let settle = Instant::now() + Duration::from_millis(500);
    while Instant::now() < settle {
        let _ = caller.pump(Duration::from_millis(10));
        let _ = callee.pump(Duration::from_millis(10));
        drain(&caller_events, &mut summary, "caller", |est| {
            video.on_estimate(est);
        });
        drain(&callee_events, &mut summary, "callee", |_| {});
        decode_frames(&mut summary, &mut decoder, sink);
    }

    caller.close();
    callee.close();
    summary.print();
    Ok(())
}

#[derive(Default)]
struct Summary {
    sent: u32,
    received: u32,
    keyframes: u32,
    pending: Vec<Vec<u8>>,
    last_bitrate: Option<u64>,
    errors: Vec<String>,
}

impl Summary {
    fn print(&self) {
        println!("Frames sent: {}, received: {} ({} keyframes)", self.sent, self.received, self.keyframes);
        if let Some(bps) = self.last_bitrate {
            println!("Last target bitrate: {bps} bps");
        }
        for e in &self.errors {
            println!("error: {e}");
        }
    }
}

fn drain(
    events: &Receiver<TransportEvent>,
    summary: &mut Summary,
    who: &str,
    mut on_bitrate: impl FnMut(&BandwidthEstimate),
) {
    while let Ok(ev) = events.try_recv() {
        match ev {
            TransportEvent::Frame { frame, .. } => summary.pending.push(frame.data),
            TransportEvent::Bitrate(est) => {
                summary.last_bitrate = Some(est.target_bitrate_bps);
                on_bitrate(&est);
            }
            TransportEvent::Stats(snapshots) => {
                for s in snapshots {
                    println!(
                        "[{}] {}: sent {} pkts ({} bps), received {} pkts ({} bps), lost {}, fec {}, rtx {}",
                        who,
                        s.media,
                        s.packets_sent,
                        s.bitrate_sent_bps,
                        s.packets_received,
                        s.bitrate_received_bps,
                        s.packets_lost,
                        s.fec_recovered,
                        s.retransmitted
                    );
                }
            }
            TransportEvent::Error(e) => summary.errors.push(e),
            _ => {}
        }
    }
}

fn decode_frames(summary: &mut Summary, decoder: &mut TestPatternDecoder, sink: &Arc<dyn LogSink>) {
    for data in summary.pending.drain(..) {
        match decoder.decode(&data) {
            Ok(pattern) => {
                summary.received += 1;
                if pattern.keyframe {
                    summary.keyframes += 1;
                }
            }
            Err(e) => sink_warn!(sink, "[Demo] undecodable frame: {}", e),
        }
    }
}
