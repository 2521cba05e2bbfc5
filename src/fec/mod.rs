pub mod block_codec;
pub mod cauchy_codec;
pub mod fec_config;
pub mod fec_decoder;
pub mod fec_encoder;
pub mod fec_error;
pub mod fec_header;
pub mod fec_receiver;
pub mod gf256;
pub mod source_block;

pub use block_codec::BlockCodec;
pub use cauchy_codec::CauchyBlockCodec;
pub use fec_config::{FEC_PAYLOAD_TYPE, FecConfig};
pub use fec_decoder::RecoveredPacket;
pub use fec_encoder::{FecEncoder, RepairSymbol};
pub use fec_error::FecError;
pub use fec_receiver::FecReceiver;
