use std::fmt;

/// The three negotiated media lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Data,
}

impl MediaKind {
    pub const ALL: [MediaKind; 3] = [MediaKind::Video, MediaKind::Audio, MediaKind::Data];

    /// Token used on the SDP `m=` line.
    pub fn sdp_token(self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Data => "data",
        }
    }

    /// RTP clock rate used for timestamps and jitter.
    pub fn clock_rate(self) -> u32 {
        match self {
            MediaKind::Video => 90_000,
            MediaKind::Audio => 48_000,
            MediaKind::Data => 1_000,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sdp_token())
    }
}
