//! RFC 6184 H.264 -> RTP packetizer (Single NALU + FU-A).
//!
//! Input  : one Annex-B access unit (may contain multiple NAL units).
//! Output : RTP payload chunks, start codes removed, marker on the last one.
//!
//! Non-interleaved mode (packetization-mode=1) only; STAP-A is not produced.

use super::rtp_payload_chunk::RtpPayloadChunk;

pub const NAL_TYPE_STAP_A: u8 = 24;
pub const NAL_TYPE_FU_A: u8 = 28;

/// H.264 (RFC 6184) packetizer.
#[derive(Debug, Clone)]
pub struct H264Packetizer {
    mtu: usize,
    /// Bytes reserved for the RTP header and extensions, not part of the payload.
    rtp_overhead: usize,
}

impl H264Packetizer {
    /// Create a packetizer with a target MTU and default RTP overhead of 12 bytes.
    pub fn new(mtu: usize) -> Self {
        Self {
            mtu,
            rtp_overhead: 12,
        }
    }

    /// Override the assumed RTP overhead (header + extensions).
    pub fn with_overhead(mut self, overhead: usize) -> Self {
        self.rtp_overhead = overhead;
        self
    }

    #[inline]
    fn max_payload(&self) -> usize {
        self.mtu.saturating_sub(self.rtp_overhead)
    }

    /// Split an Annex-B access unit into RTP payload chunks.
    ///
    /// Uses Single-NALU if `nal.len() <= max_payload`, else FU-A. The
    /// `marker` flag is true on the last returned chunk only.
    pub fn packetize(&self, annexb_frame: &[u8]) -> Vec<RtpPayloadChunk> {
        let mut out = Vec::new();
        let max_payload = self.max_payload();

        for nalu in split_annexb_nalus(annexb_frame) {
            if nalu.len() <= max_payload {
                out.push(RtpPayloadChunk::new(nalu.to_vec(), false));
                continue;
            }

            let nalu_header = nalu[0];
            // FU Indicator: F | NRI | 28
            let fu_indicator = (nalu_header & 0xE0) | NAL_TYPE_FU_A;
            let nal_type = nalu_header & 0x1F;

            // Each FU-A payload reserves 2 bytes for (FU-Ind, FU-Hdr)
            let frag_budget = max_payload.saturating_sub(2);
            if frag_budget == 0 {
                // Degenerate config; avoid infinite loop
                continue;
            }

            let mut offset = 1; // skip original NALU header
            let n = nalu.len();
            while offset < n {
                let take = (n - offset).min(frag_budget);
                let s_bit = if offset == 1 { 0x80 } else { 0x00 };
                let e_bit = if offset + take == n { 0x40 } else { 0x00 };

                let mut payload = Vec::with_capacity(2 + take);
                payload.push(fu_indicator);
                payload.push(s_bit | e_bit | nal_type);
                payload.extend_from_slice(&nalu[offset..offset + take]);
                out.push(RtpPayloadChunk::new(payload, false));

                offset += take;
            }
        }

        if let Some(last) = out.last_mut() {
            last.marker = true;
        }
        out
    }
}

/// Splits Annex-B data on 3- and 4-byte start codes, skipping empty NAL units.
/// Data without any start code is returned as a single NAL unit.
pub fn split_annexb_nalus(data: &[u8]) -> Vec<&[u8]> {
    let Some((mut sc_pos, mut sc_len)) = find_start_code(data, 0) else {
        return if data.is_empty() {
            Vec::new()
        } else {
            vec![data]
        };
    };

    let mut out = Vec::new();
    loop {
        let nal_start = sc_pos + sc_len;
        let next = find_start_code(data, nal_start);
        let nal_end = next.map_or(data.len(), |(p, _)| p);
        if nal_end > nal_start {
            out.push(&data[nal_start..nal_end]);
        }
        match next {
            Some((p, l)) => {
                sc_pos = p;
                sc_len = l;
            }
            None => break,
        }
    }
    out
}

/// Joins NAL units into an Annex-B buffer with 4-byte start codes.
pub fn build_annexb<T: AsRef<[u8]>>(nalus: &[T]) -> Vec<u8> {
    let total_len: usize = nalus.iter().map(|n| n.as_ref().len() + 4).sum();
    let mut out = Vec::with_capacity(total_len);
    for n in nalus {
        out.extend_from_slice(&[0, 0, 0, 1]);
        out.extend_from_slice(n.as_ref());
    }
    out
}

#[inline]
fn find_start_code(data: &[u8], from: usize) -> Option<(usize, usize)> {
    let n = data.len();
    let mut i = from;
    while i + 3 <= n {
        // Prefer 4-byte 00 00 00 01 if present
        if i + 4 <= n && data[i..i + 4] == [0, 0, 0, 1] {
            return Some((i, 4));
        }
        if data[i..i + 3] == [0, 0, 1] {
            return Some((i, 3));
        }
        i += 1;
    }
    None
}
