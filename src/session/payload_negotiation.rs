//! Payload-type negotiation and the `m=` sections we offer or answer with.
//!
//! Negotiation runs once per media line: the remote payload-type list is
//! scanned in order and the first type we support wins.

use crate::{
    channel::MediaKind,
    fec::FEC_PAYLOAD_TYPE,
    rtp::payload::PayloadCodec,
    sdp::{Attribute, MediaSection, RtpMap, SdpError, SessionDescription},
};

use super::transport_error::TransportError;

pub const VIDEO_H264_PT: u8 = 96;
pub const VIDEO_AV1_PT: u8 = 98;
pub const DATA_PT: u8 = 100;
pub const AUDIO_OPUS_PT: u8 = 111;

/// Stands in for the negotiated payload type in answer templates.
pub const PT_PLACEHOLDER: &str = "$PT";

const DEFAULT_PORT: u16 = 9;
const DEFAULT_PROTO: &str = "UDP/RTP/AVPF";
const FEC_ENCODING: &str = "x-rs-fec";
const DATA_ENCODING: &str = "x-deskrtc-data";

/// Codecs we can send and receive for `media`, in offer preference order.
pub fn supported_rtp_maps(media: MediaKind) -> Vec<RtpMap> {
    match media {
        MediaKind::Video => vec![
            RtpMap::new(VIDEO_H264_PT, "H264", 90_000),
            RtpMap::new(VIDEO_AV1_PT, "AV1", 90_000),
        ],
        MediaKind::Audio => vec![RtpMap::new(AUDIO_OPUS_PT, "opus", 48_000).with_params(2)],
        MediaKind::Data => vec![RtpMap::new(DATA_PT, DATA_ENCODING, 1_000)],
    }
}

fn fec_rtp_map() -> RtpMap {
    RtpMap::new(FEC_PAYLOAD_TYPE, FEC_ENCODING, 90_000)
}

/// First entry of `remote` (in remote order) that is also in `local`.
/// Entries that are not numbers are skipped.
pub fn first_match(remote: &[String], local: &[u8]) -> Option<u8> {
    remote
        .iter()
        .filter_map(|t| t.parse::<u8>().ok())
        .find(|pt| local.contains(pt))
}

/// Outcome of negotiating one media line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedMedia {
    pub media: MediaKind,
    pub payload_type: u8,
    pub codec: PayloadCodec,
    pub rtp_map: RtpMap,
    /// Both sides listed the FEC payload type (video only).
    pub fec: bool,
}

/// Negotiates every media line in `media` against `remote`.
///
/// # Errors
/// `NegotiationFailed` for the first media line that is missing from the
/// remote description or shares no payload type with us.
pub fn negotiate(
    remote: &SessionDescription,
    media: &[MediaKind],
    fec_enabled: bool,
) -> Result<Vec<NegotiatedMedia>, TransportError> {
    media
        .iter()
        .map(|&m| {
            let failed = || TransportError::NegotiationFailed { media: m };
            let remote_list = remote.payload_types(m.sdp_token()).map_err(|_| failed())?;
            let supported = supported_rtp_maps(m);
            let local: Vec<u8> = supported.iter().map(|r| r.payload_type).collect();
            let pt = first_match(remote_list, &local).ok_or_else(failed)?;
            let rtp_map = supported
                .into_iter()
                .find(|r| r.payload_type == pt)
                .ok_or_else(failed)?;
            let fec_pt = FEC_PAYLOAD_TYPE.to_string();
            Ok(NegotiatedMedia {
                media: m,
                payload_type: pt,
                codec: rtp_map.codec(),
                rtp_map,
                fec: m == MediaKind::Video && fec_enabled && remote_list.contains(&fec_pt),
            })
        })
        .collect()
}

/// `m=` section listing everything we support for `media`.
pub fn offer_section(media: MediaKind, fec_enabled: bool) -> MediaSection {
    let mut maps = supported_rtp_maps(media);
    if fec_enabled && media == MediaKind::Video {
        maps.push(fec_rtp_map());
    }
    let fmts = maps.iter().map(|m| m.payload_type.to_string()).collect();
    let mut section = MediaSection::new(media.sdp_token(), DEFAULT_PORT, DEFAULT_PROTO, fmts);
    for m in maps {
        section.add_attr(Attribute::new("rtpmap", Some(m.to_string())));
    }
    add_common_attrs(&mut section, media);
    section
}

/// Answer `m=` section with [`PT_PLACEHOLDER`] where the negotiated payload
/// type goes; fill it in with [`SessionDescription::replace_placeholder`].
pub fn answer_template(negotiated: &NegotiatedMedia) -> MediaSection {
    let mut fmts = vec![PT_PLACEHOLDER.to_string()];
    if negotiated.fec {
        fmts.push(FEC_PAYLOAD_TYPE.to_string());
    }
    let media = negotiated.media;
    let mut section = MediaSection::new(media.sdp_token(), DEFAULT_PORT, DEFAULT_PROTO, fmts);

    let map = &negotiated.rtp_map;
    let mut value = format!("{PT_PLACEHOLDER} {}/{}", map.encoding_name, map.clock_rate);
    if let Some(p) = map.encoding_params {
        value.push_str(&format!("/{p}"));
    }
    section.add_attr(Attribute::new("rtpmap", Some(value)));
    if negotiated.fec {
        section.add_attr(Attribute::new("rtpmap", Some(fec_rtp_map().to_string())));
    }
    add_common_attrs(&mut section, media);
    section
}

/// Replaces the placeholder of every negotiated line in `answer`.
///
/// # Errors
/// `NoMediaSection` or `NoPlaceholder` if `answer` was not built from
/// [`answer_template`].
pub fn fill_answer(answer: &mut SessionDescription, negotiated: &[NegotiatedMedia]) -> Result<(), SdpError> {
    for n in negotiated {
        answer.replace_placeholder(
            n.media.sdp_token(),
            PT_PLACEHOLDER,
            &n.payload_type.to_string(),
        )?;
    }
    Ok(())
}

fn add_common_attrs(section: &mut MediaSection, media: MediaKind) {
    section.add_attr(Attribute::new("mid", Some(media.sdp_token().to_string())));
    section.add_attr(Attribute::flag("rtcp-mux"));
}
