pub mod config;
pub mod payload;
pub mod rtp_error;
pub mod rtp_header;
pub mod rtp_header_extension;
pub mod rtp_packet;
pub mod seq_ext;
pub mod time;

pub use rtp_error::RtpError;
pub use rtp_header::RtpHeader;
pub use rtp_header_extension::{ExtensionElement, RtpHeaderExtension};
pub use rtp_packet::RtpPacket;
