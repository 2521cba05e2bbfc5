pub mod common_header;
pub mod config;
pub mod congestion_feedback;
pub mod generic_nack;
pub mod packet_type;
pub mod receiver_report;
pub mod report_block;
pub mod rtcp;
pub mod rtcp_error;
pub mod sender_info;
pub mod sender_report;

pub use congestion_feedback::{CongestionControlFeedback, Ecn, PacketReport, StreamFeedback};
pub use generic_nack::GenericNack;
pub use receiver_report::ReceiverReport;
pub use report_block::ReportBlock;
pub use rtcp::RtcpPacket;
pub use rtcp_error::RtcpError;
pub use sender_info::SenderInfo;
pub use sender_report::SenderReport;
