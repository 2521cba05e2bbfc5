/// The only RTP version on the wire (RFC 3550).
pub const RTP_VERSION: u8 = 2;
/// Fixed header size without CSRCs or extension.
pub const RTP_FIXED_HEADER_LEN: usize = 12;
/// At most 15 contributing sources fit in the 4-bit CC field.
pub const MAX_CSRC_COUNT: usize = 15;
/// Profile marker of the one-byte header extension format (RFC 8285).
pub const ONE_BYTE_EXTENSION_PROFILE: u16 = 0xBEDE;
/// Path MTU every packet except the last fragment of a frame must fit in.
pub const PATH_MTU: usize = 1500;
/// One-byte extension id of the frame block offset (4 bytes, big-endian).
pub const FRAME_BLOCK_OFFSET_EXTENSION_ID: u8 = 2;
/// Wire bytes the block offset extension adds to a packet (4-byte extension
/// header plus the padded element).
pub const FRAME_BLOCK_OFFSET_EXTENSION_LEN: usize = 12;
