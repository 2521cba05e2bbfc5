use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use super::{candidate_type::CandidateType, ice_error::IceError};

/// Maximum local preference (interface-insensitive)
const MAX_LOCAL_PREF: u16 = u16::MAX;

/// Offsets used in the priority calculation -> RFC 8445 §5.1.2.1
const TYPE_PREF_SHIFT: u32 = 24;
const LOCAL_PREF_SHIFT: u32 = 8;
const COMPONENT_OFFSET: u32 = 256;

/// A transport address offered to the remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Groups candidates sharing type, base and transport.
    pub foundation: String,
    /// 1 = RTP (rtcp-mux keeps everything on one component)
    pub component: u8,
    pub transport: String,
    pub priority: u32,
    pub address: SocketAddr,
    pub cand_type: CandidateType,
    /// Base address for reflexive and relayed candidates.
    pub related_address: Option<SocketAddr>,
}

impl Candidate {
    pub fn new(
        address: SocketAddr,
        cand_type: CandidateType,
        component: u8,
        related_address: Option<SocketAddr>,
    ) -> Self {
        let transport = "udp".to_string();
        Self {
            foundation: calculate_foundation(cand_type, &transport, &address.ip()),
            component,
            priority: calculate_priority(cand_type, MAX_LOCAL_PREF, component),
            transport,
            address,
            cand_type,
            related_address,
        }
    }

    /// Convenience for host candidates
    pub fn host(address: SocketAddr) -> Self {
        Self::new(address, CandidateType::Host, 1, None)
    }

    /// Value of an `a=candidate:` SDP attribute (without the prefix).
    pub fn to_sdp_value(&self) -> String {
        self.to_string()
    }
}

// RFC 8445 §5.1.1.3: foundation (any stable identifier OK)
fn calculate_foundation(cand_type: CandidateType, transport: &str, base_ip: &IpAddr) -> String {
    let mut hasher = DefaultHasher::new();
    format!("{cand_type}-{transport}-{base_ip}").hash(&mut hasher);
    format!("{:x}", hasher.finish() & 0xFFFF_FFFF)
}

// RFC 8445 §5.1.2.1: 32-bit candidate priority
const fn calculate_priority(cand_type: CandidateType, local_pref: u16, component_id: u8) -> u32 {
    (cand_type.type_preference() << TYPE_PREF_SHIFT)
        | ((local_pref as u32) << LOCAL_PREF_SHIFT)
        | (COMPONENT_OFFSET - component_id as u32)
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} typ {}",
            self.foundation,
            self.component,
            self.transport,
            self.priority,
            self.address.ip(),
            self.address.port(),
            self.cand_type,
        )?;
        if let Some(rel) = self.related_address {
            write!(f, " raddr {} rport {}", rel.ip(), rel.port())?;
        }
        Ok(())
    }
}

impl FromStr for Candidate {
    type Err = IceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("a=").unwrap_or(s);
        let s = s.strip_prefix("candidate:").unwrap_or(s);
        let bad = |what: &str| IceError::InvalidCandidate(format!("{what} in '{s}'"));

        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.len() < 8 {
            return Err(bad("too few fields"));
        }
        let component: u8 = parts[1].parse().map_err(|_| bad("invalid component"))?;
        let priority: u32 = parts[3].parse().map_err(|_| bad("invalid priority"))?;
        let ip: IpAddr = parts[4].parse().map_err(|_| bad("invalid IP address"))?;
        let port: u16 = parts[5].parse().map_err(|_| bad("invalid port"))?;
        if parts[6] != "typ" {
            return Err(bad("missing 'typ'"));
        }
        let cand_type: CandidateType = parts[7].parse()?;

        let mut raddr: Option<IpAddr> = None;
        let mut rport: Option<u16> = None;
        let mut i = 8;
        while i + 1 < parts.len() {
            match parts[i] {
                "raddr" => raddr = Some(parts[i + 1].parse().map_err(|_| bad("invalid raddr"))?),
                "rport" => rport = Some(parts[i + 1].parse().map_err(|_| bad("invalid rport"))?),
                _ => {}
            }
            i += 2;
        }

        Ok(Self {
            foundation: parts[0].to_string(),
            component,
            transport: parts[2].to_ascii_lowercase(),
            priority,
            address: SocketAddr::new(ip, port),
            cand_type,
            related_address: raddr.map(|ip| SocketAddr::new(ip, rport.unwrap_or(0))),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn sdp_value_round_trips() {
        let c = Candidate::new(
            "203.0.113.7:40000".parse().unwrap(),
            CandidateType::ServerReflexive,
            1,
            Some("192.168.1.4:5000".parse().unwrap()),
        );
        let line = format!("a=candidate:{}", c.to_sdp_value());
        assert_eq!(line.parse::<Candidate>().unwrap(), c);
    }

    #[test]
    fn host_outranks_relay() {
        let addr: SocketAddr = "10.0.0.5:4000".parse().unwrap();
        let host = Candidate::host(addr);
        let relay = Candidate::new(addr, CandidateType::Relayed, 1, None);
        assert!(host.priority > relay.priority);
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert!("1 1 udp 5 10.0.0.1 9 host".parse::<Candidate>().is_err());
        assert!("1 1 udp x 10.0.0.1 9 typ host".parse::<Candidate>().is_err());
        assert!("1 1 udp 5 10.0.0.1 9 typ bogus".parse::<Candidate>().is_err());
    }
}
