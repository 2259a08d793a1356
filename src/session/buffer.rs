use std::collections::VecDeque;

/// Audio held while no upstream stream is valid.
///
/// Bounded by total bytes; on overflow the oldest frames are dropped.
#[derive(Debug)]
pub struct PendingAudio {
    frames: VecDeque<Vec<u8>>,
    bytes: usize,
    capacity_bytes: usize,
}

impl PendingAudio {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            frames: VecDeque::new(),
            bytes: 0,
            capacity_bytes: capacity_bytes.max(1),
        }
    }

    /// Append a frame, returning how many older frames were dropped to make room
    pub fn push(&mut self, frame: Vec<u8>) -> usize {
        let mut dropped = 0;

        while !self.frames.is_empty() && self.bytes + frame.len() > self.capacity_bytes {
            if let Some(old) = self.frames.pop_front() {
                self.bytes -= old.len();
                dropped += 1;
            }
        }

        // A single frame larger than the whole buffer is still kept
        self.bytes += frame.len();
        self.frames.push_back(frame);

        dropped
    }

    /// Remove all frames in arrival order
    pub fn drain(&mut self) -> impl Iterator<Item = Vec<u8>> + '_ {
        self.bytes = 0;
        self.frames.drain(..)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_arrival_order() {
        let mut pending = PendingAudio::new(100);
        pending.push(vec![1; 10]);
        pending.push(vec![2; 10]);
        pending.push(vec![3; 10]);

        let drained: Vec<u8> = pending.drain().map(|f| f[0]).collect();
        assert_eq!(drained, vec![1, 2, 3]);
        assert!(pending.is_empty());
        assert_eq!(pending.bytes(), 0);
    }

    #[test]
    fn test_drops_oldest_on_overflow() {
        let mut pending = PendingAudio::new(30);
        assert_eq!(pending.push(vec![1; 10]), 0);
        assert_eq!(pending.push(vec![2; 10]), 0);
        assert_eq!(pending.push(vec![3; 10]), 0);
        assert_eq!(pending.push(vec![4; 10]), 1);
        assert_eq!(pending.push(vec![5; 20]), 2);

        assert_eq!(pending.len(), 2);
        assert_eq!(pending.bytes(), 30);
        let drained: Vec<u8> = pending.drain().map(|f| f[0]).collect();
        assert_eq!(drained, vec![4, 5]);
    }

    #[test]
    fn test_oversized_frame_replaces_everything() {
        let mut pending = PendingAudio::new(16);
        pending.push(vec![1; 8]);
        pending.push(vec![2; 8]);

        assert_eq!(pending.push(vec![3; 64]), 2);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending.bytes(), 64);
    }
}
