use crate::rtp::seq_ext::seq_delta;

pub const RETRANSMISSION_BUFFER_SIZE: usize = 512;

/// Recently sent media packets by sequence number, for answering NACKs.
/// Slots are indexed by `seq % size`; a slot only answers for its exact seq.
pub struct RetransmissionBuffer {
    slots: Vec<Option<(u16, Vec<u8>)>>,
    highest: Option<u16>,
}

impl RetransmissionBuffer {
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![None; size.max(1)],
            highest: None,
        }
    }

    fn index(&self, seq: u16) -> usize {
        usize::from(seq) % self.slots.len()
    }

    pub fn insert(&mut self, seq: u16, bytes: Vec<u8>) {
        if self.highest.is_none_or(|h| seq_delta(seq, h) > 0) {
            self.highest = Some(seq);
        }
        let idx = self.index(seq);
        self.slots[idx] = Some((seq, bytes));
    }

    pub fn get(&self, seq: u16) -> Option<&[u8]> {
        let highest = self.highest?;
        let age = seq_delta(highest, seq);
        if age < 0 || age as usize >= self.slots.len() {
            return None;
        }
        match &self.slots[self.index(seq)] {
            Some((s, bytes)) if *s == seq => Some(bytes),
            _ => None,
        }
    }
}

impl Default for RetransmissionBuffer {
    fn default() -> Self {
        Self::new(RETRANSMISSION_BUFFER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_only_recent_sequence_numbers() {
        let mut b = RetransmissionBuffer::new(4);
        for seq in 65534..=65535u16 {
            b.insert(seq, vec![seq as u8]);
        }
        for seq in 0..3u16 {
            b.insert(seq, vec![seq as u8]);
        }
        assert_eq!(b.get(2), Some(&[2u8][..]));
        assert_eq!(b.get(65535), Some(&[0xFFu8][..]));
        // overwritten by seq 2
        assert_eq!(b.get(65534), None);
        assert_eq!(b.get(3), None);
    }
}
