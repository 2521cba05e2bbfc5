//! Line-oriented session description.
//!
//! Only what the negotiator needs is modelled: session-level attributes,
//! `m=` sections with their attributes, and verbatim passthrough for every
//! other line.

use std::fmt;
use std::str::FromStr;

use super::{attribute::Attribute, media_section::MediaSection, sdp_error::SdpError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    /// `o=`, `s=`, `t=`, ... kept verbatim (without `v=`).
    session_lines: Vec<String>,
    attrs: Vec<Attribute>,
    media: Vec<MediaSection>,
}

impl SessionDescription {
    /// A minimal description with origin `session_id`.
    pub fn new(session_id: u64) -> Self {
        Self {
            session_lines: vec![
                format!("o=- {session_id} 2 IN IP4 127.0.0.1"),
                "s=-".to_string(),
                "t=0 0".to_string(),
            ],
            attrs: Vec::new(),
            media: Vec::new(),
        }
    }

    /// # Errors
    /// `Missing("v=")`, `Invalid("v=")` for a version other than 0, or a
    /// malformed `m=`/`a=` line.
    pub fn parse(input: &str) -> Result<Self, SdpError> {
        let mut version = None;
        let mut session_lines = Vec::new();
        let mut attrs = Vec::new();
        let mut media: Vec<MediaSection> = Vec::new();

        for raw in input.split('\n') {
            let line = raw.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let Some((prefix, rest)) = line.split_once('=') else {
                return Err(SdpError::Invalid("line"));
            };
            if prefix == "v" {
                if rest.trim().parse::<u8>()? != 0 {
                    return Err(SdpError::Invalid("v="));
                }
                version = Some(0);
                continue;
            }
            if prefix == "m" {
                media.push(MediaSection::parse_m_line(line)?);
                continue;
            }
            match (prefix, media.last_mut()) {
                ("a", Some(m)) => m.add_attr(rest.parse()?),
                ("a", None) => attrs.push(rest.parse()?),
                (_, Some(m)) => m.add_extra_line(line),
                (_, None) => session_lines.push(line.to_string()),
            }
        }
        if version.is_none() {
            return Err(SdpError::Missing("v="));
        }
        Ok(Self {
            session_lines,
            attrs,
            media,
        })
    }

    pub fn media_sections(&self) -> &[MediaSection] {
        &self.media
    }

    /// The section introduced by `m=<media>`.
    pub fn media(&self, media: &str) -> Option<&MediaSection> {
        self.media.iter().find(|m| m.media() == media)
    }

    pub fn media_mut(&mut self, media: &str) -> Option<&mut MediaSection> {
        self.media.iter_mut().find(|m| m.media() == media)
    }

    pub fn add_media(&mut self, section: MediaSection) {
        self.media.push(section);
    }

    pub fn attrs(&self) -> &[Attribute] {
        &self.attrs
    }

    pub fn add_attr(&mut self, attr: Attribute) {
        self.attrs.push(attr);
    }

    /// First session-level value of `key`, falling back to the media
    /// sections.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.key() == key)
            .and_then(Attribute::value)
            .or_else(|| self.media.iter().find_map(|m| m.attr(key)))
    }

    pub fn has_flag(&self, key: &str) -> bool {
        self.attrs.iter().any(|a| a.key() == key)
            || self.media.iter().any(|m| m.attrs().iter().any(|a| a.key() == key))
    }

    /// Every `a=candidate` value, session level first.
    pub fn candidates(&self) -> Vec<&str> {
        self.attrs
            .iter()
            .chain(self.media.iter().flat_map(|m| m.attrs().iter()))
            .filter(|a| a.key() == "candidate")
            .filter_map(Attribute::value)
            .collect()
    }

    /// Payload types of `m=<media>` in listed order.
    ///
    /// # Errors
    /// `NoMediaSection` when the section is absent.
    pub fn payload_types(&self, media: &str) -> Result<&[String], SdpError> {
        self.media(media)
            .map(MediaSection::payload_types)
            .ok_or_else(|| SdpError::NoMediaSection(media.to_string()))
    }

    /// Replaces `placeholder` within the `m=<media>` section only.
    ///
    /// # Errors
    /// `NoMediaSection`, or `NoPlaceholder` when nothing was replaced.
    pub fn replace_placeholder(&mut self, media: &str, placeholder: &str, value: &str) -> Result<(), SdpError> {
        let section = self
            .media_mut(media)
            .ok_or_else(|| SdpError::NoMediaSection(media.to_string()))?;
        if section.replace_token(placeholder, value) == 0 {
            return Err(SdpError::NoPlaceholder {
                media: media.to_string(),
                placeholder: placeholder.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for SessionDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::from("v=0\r\n");
        for l in &self.session_lines {
            out.push_str(l);
            out.push_str("\r\n");
        }
        for a in &self.attrs {
            out.push_str(&format!("a={a}\r\n"));
        }
        for m in &self.media {
            m.fmt_lines(&mut out);
        }
        f.write_str(&out)
    }
}

impl FromStr for SessionDescription {
    type Err = SdpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    const OFFER: &str = "v=0\r\n\
o=- 42 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
a=ice-ufrag:abcd\r\n\
a=ice-pwd:secretsecretsecret\r\n\
m=video 9 UDP/RTP/AVPF 98 96 125\r\n\
c=IN IP4 0.0.0.0\r\n\
a=rtpmap:98 AV1/90000\r\n\
a=rtpmap:96 H264/90000\r\n\
a=candidate:1 1 udp 2130706431 127.0.0.1 40000 typ host\r\n\
m=audio 9 UDP/RTP/AVPF 111\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=end-of-candidates\r\n";

    #[test]
    fn parses_sections_and_attributes() {
        let sdp = SessionDescription::parse(OFFER).unwrap();
        assert_eq!(sdp.media_sections().len(), 2);
        assert_eq!(sdp.payload_types("video").unwrap(), ["98", "96", "125"]);
        assert_eq!(sdp.attr("ice-ufrag"), Some("abcd"));
        assert_eq!(sdp.candidates().len(), 1);
        assert!(sdp.has_flag("end-of-candidates"));
        assert_eq!(sdp.media("video").unwrap().rtp_map(96).unwrap().clock_rate, 90_000);
        assert!(matches!(sdp.payload_types("data"), Err(SdpError::NoMediaSection(_))));
    }

    #[test]
    fn display_round_trips() {
        let sdp = SessionDescription::parse(OFFER).unwrap();
        let again = SessionDescription::parse(&sdp.to_string()).unwrap();
        assert_eq!(sdp, again);
    }

    #[test]
    fn placeholder_replacement_is_scoped_to_one_section() {
        let mut sdp = SessionDescription::new(7);
        sdp.add_media(MediaSection::new("video", 9, "UDP/RTP/AVPF", vec!["$PT".into()]));
        sdp.add_media(MediaSection::new("audio", 9, "UDP/RTP/AVPF", vec!["$PT".into()]));
        sdp.replace_placeholder("video", "$PT", "96").unwrap();
        assert_eq!(sdp.payload_types("video").unwrap(), ["96"]);
        assert_eq!(sdp.payload_types("audio").unwrap(), ["$PT"]);
        assert!(matches!(
            sdp.replace_placeholder("video", "$PT", "96"),
            Err(SdpError::NoPlaceholder { .. })
        ));
    }

    #[test]
    fn version_is_required() {
        assert_eq!(SessionDescription::parse("s=-\r\n"), Err(SdpError::Missing("v=")));
        assert_eq!(SessionDescription::parse("v=1\r\n"), Err(SdpError::Invalid("v=")));
    }
}
