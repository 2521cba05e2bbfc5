//! Per-media send/receive channels and their helpers.
pub mod bounded_queue;
pub mod channel_config;
pub mod channel_error;
pub mod channel_receive;
pub mod channel_send;
pub mod channel_stats;
pub mod feedback_recorder;
pub mod media_kind;
pub mod nack_tracker;
pub mod pacing_gate;
pub mod retransmission_buffer;
pub mod rtcp_timer;
pub mod rx_tracker;
pub mod stats_worker;
pub mod tx_tracker;

pub use bounded_queue::BoundedQueue;
pub use channel_config::{ReceiveChannelConfig, SendChannelConfig};
pub use channel_error::ChannelError;
pub use channel_receive::{ChannelReceive, ReceiveHandle};
pub use channel_send::{ChannelSend, SendControl, SendHandle};
pub use channel_stats::{ChannelStats, StatsSnapshot};
pub use media_kind::MediaKind;
pub use rtcp_timer::{RtcpTimer, RtcpTimerConfig};
pub use stats_worker::StatsWorker;
