use std::fmt::Write as _;

use super::{attribute::Attribute, rtp_map::RtpMap, sdp_error::SdpError};

/// One `m=` section and the lines that follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSection {
    media: String,
    port: u16,
    proto: String,
    fmts: Vec<String>,
    attrs: Vec<Attribute>,
    /// Non-attribute lines kept for round-trip (`c=`, `b=`, ...).
    extra_lines: Vec<String>,
}

/// Tokens after the third space of an `m=` line: the payload-type list.
pub fn payload_type_list(m_line: &str) -> Vec<String> {
    m_line
        .trim_end()
        .splitn(4, ' ')
        .nth(3)
        .map(|rest| rest.split_whitespace().map(ToOwned::to_owned).collect())
        .unwrap_or_default()
}

impl MediaSection {
    pub fn new<M: Into<String>, P: Into<String>>(media: M, port: u16, proto: P, fmts: Vec<String>) -> Self {
        Self {
            media: media.into(),
            port,
            proto: proto.into(),
            fmts,
            attrs: Vec::new(),
            extra_lines: Vec::new(),
        }
    }

    /// Parses an `m=<media> <port> <proto> <fmt>...` line.
    ///
    /// # Errors
    /// `Invalid("m=")` for a line with fewer than three fields or a bad port.
    pub fn parse_m_line(line: &str) -> Result<Self, SdpError> {
        let rest = line.strip_prefix("m=").ok_or(SdpError::Invalid("m="))?;
        let mut it = rest.split_whitespace();
        let media = it.next().ok_or(SdpError::Invalid("m="))?;
        let port = it
            .next()
            .ok_or(SdpError::Invalid("m= port"))?
            .split('/')
            .next()
            .unwrap_or_default()
            .parse::<u16>()?;
        let proto = it.next().ok_or(SdpError::Invalid("m= proto"))?;
        Ok(Self::new(media, port, proto, payload_type_list(line.trim_end())))
    }

    pub fn media(&self) -> &str {
        &self.media
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn proto(&self) -> &str {
        &self.proto
    }

    /// Payload types in the order the author listed them.
    pub fn payload_types(&self) -> &[String] {
        &self.fmts
    }

    pub fn attrs(&self) -> &[Attribute] {
        &self.attrs
    }

    pub fn add_attr(&mut self, attr: Attribute) {
        self.attrs.push(attr);
    }

    pub fn add_extra_line<S: Into<String>>(&mut self, line: S) {
        self.extra_lines.push(line.into());
    }

    /// First value of attribute `key`.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.key() == key)
            .and_then(Attribute::value)
    }

    pub fn rtp_map(&self, payload_type: u8) -> Option<RtpMap> {
        self.attrs
            .iter()
            .filter(|a| a.key() == "rtpmap")
            .filter_map(Attribute::value)
            .filter_map(|v| v.parse::<RtpMap>().ok())
            .find(|m| m.payload_type == payload_type)
    }

    /// Replaces every whole-token occurrence of `placeholder` in the
    /// protocol, the format list and attribute values. Returns how many
    /// tokens were replaced.
    pub fn replace_token(&mut self, placeholder: &str, value: &str) -> usize {
        let mut n = 0;
        if self.proto == placeholder {
            self.proto = value.to_string();
            n += 1;
        }
        for f in &mut self.fmts {
            if f == placeholder {
                *f = value.to_string();
                n += 1;
            }
        }
        for a in &mut self.attrs {
            let Some(v) = a.value() else { continue };
            if !v.split_whitespace().any(|t| t == placeholder) {
                continue;
            }
            let replaced: Vec<&str> = v
                .split(' ')
                .map(|t| if t == placeholder { value } else { t })
                .collect();
            n += v.split_whitespace().filter(|t| *t == placeholder).count();
            a.set_value(Some(replaced.join(" ")));
        }
        n
    }

    pub fn fmt_lines(&self, out: &mut String) {
        let fmts = if self.fmts.is_empty() {
            String::new()
        } else {
            format!(" {}", self.fmts.join(" "))
        };
        let _ = write!(out, "m={} {} {}{}\r\n", self.media, self.port, self.proto, fmts);
        for x in &self.extra_lines {
            let _ = write!(out, "{x}\r\n");
        }
        for a in &self.attrs {
            let _ = write!(out, "a={a}\r\n");
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn payload_types_follow_the_third_space() {
        assert_eq!(payload_type_list("m=video 9 UDP/RTP/AVPF 98 96 125"), ["98", "96", "125"]);
        assert_eq!(payload_type_list("m=audio 9 RTP/AVP"), Vec::<String>::new());
        let m = MediaSection::parse_m_line("m=audio 5004/2 RTP/AVP 111").unwrap();
        assert_eq!((m.media(), m.port(), m.proto()), ("audio", 5004, "RTP/AVP"));
        assert_eq!(m.payload_types(), ["111"]);
    }

    #[test]
    fn bad_m_lines() {
        assert_eq!(MediaSection::parse_m_line("m=video"), Err(SdpError::Invalid("m= port")));
        assert!(MediaSection::parse_m_line("m=video x RTP/AVP 96").is_err());
        assert_eq!(MediaSection::parse_m_line("a=video"), Err(SdpError::Invalid("m=")));
    }

    #[test]
    fn placeholder_is_replaced_in_formats_and_attributes() {
        let mut m = MediaSection::new("video", 9, "UDP/RTP/AVPF", vec!["$PT".into()]);
        m.add_attr(Attribute::new("rtpmap", Some("$PT H264/90000".to_string())));
        m.add_attr(Attribute::new("mid", Some("$PTX".to_string())));
        assert_eq!(m.replace_token("$PT", "96"), 2);
        assert_eq!(m.payload_types(), ["96"]);
        assert_eq!(m.rtp_map(96).unwrap().encoding_name, "H264");
        assert_eq!(m.attr("mid"), Some("$PTX"));
    }
}
