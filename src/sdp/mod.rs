//! Session description handling for offer/answer.
pub mod attribute;
pub mod media_section;
pub mod rtp_map;
pub mod sdp_error;
pub mod session_description;

pub use attribute::Attribute;
pub use media_section::{MediaSection, payload_type_list};
pub use rtp_map::{RtpMap, RtpMapParseError};
pub use sdp_error::SdpError;
pub use session_description::SessionDescription;
