/// Rate knobs pushed to an encoder when the target bitrate changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSettings {
    pub bitrate_bps: u32,
    pub fps: u32,
    /// Frames between forced keyframes.
    pub keyint: u32,
}

impl EncoderSettings {
    /// Lower targets trade frame rate for quality and space keyframes out.
    pub fn for_bitrate(bitrate_bps: u64) -> Self {
        let bitrate_bps = u32::try_from(bitrate_bps).unwrap_or(u32::MAX);
        let (fps, keyint) = if bitrate_bps >= 1_500_000 {
            (30, 60)
        } else if bitrate_bps >= 800_000 {
            (25, 90)
        } else {
            (20, 120)
        };
        Self {
            bitrate_bps,
            fps,
            keyint,
        }
    }
}
