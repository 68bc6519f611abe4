//! Locates trigger edges in captured samples: a hysteresis edge scanner using SIMD operations,
//! and the software trigger built on it for models whose hardware trigger is not usable.

use std::ops::Range;

use crate::spec::Slope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeFilter {
    Rising  = 0b01,
    Falling = 0b10,
    Both    = 0b11,
}

impl From<Slope> for EdgeFilter {
    fn from(slope: Slope) -> Self {
        match slope {
            Slope::Positive => EdgeFilter::Rising,
            Slope::Negative => EdgeFilter::Falling,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising  = 0b01,
    Falling = 0b10,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Fresh,
    Below,
    Above
}

#[derive(Debug, Clone, Copy)]
pub struct Trigger {
    state: State,
    level: i8, // if let Fresh = state { state = if sample < level { Below } else { Above } }
    below: i8, // if sample < below { state = Below }
    above: i8, // if sample > above { state = Above }
}

impl Trigger {
    /// Create a new trigger mechanism at `level`.
    ///
    /// The trigger mechanism detects an "above condition" when it processes a sample that is
    /// strictly above `level + hysteresis`, and a "below condition" when it processes a sample
    /// that is strictly below `level - hysteresis`. A rising edge is detected at the sample where
    /// a below condition turns into an above condition, and a falling edge at the sample where
    /// an above condition turns into a below condition.
    ///
    /// The total amount of hysteresis (the amount of LSBs the input value has to change by to
    /// overcome the memory of the trigger mechanism) is `1 + 2 * hysteresis`.
    ///
    /// For example, if `hysteresis` is 1 and `level` is `50`, when processing a stream of samples
    /// `[10, 49, 50, 51, 52, 53, 49, 48, 10]`, a rising edge is detected at sample #4 (value 52),
    /// and a falling edge is detected at sample #7 (value 48).
    ///
    /// The combination of level and hysteresis is clamped to the full scale such that some
    /// sequence of sample values always causes a trigger to be detected.
    pub fn new(level: i8, hysteresis: u8) -> Trigger {
        Trigger {
            state: State::Fresh,
            level,
            below: level.saturating_sub_unsigned(hysteresis).max(-127),
            above: level.saturating_add_unsigned(hysteresis).min( 126),
        }
    }

    /// Scan incoming data for edges.
    ///
    /// The return value indicates whether processing has ended because an edge has been detected,
    /// or because no more samples could been processed. If an edge has been detected, after
    /// the function returns, `samples` point to the sample that caused the edge to be detected.
    ///
    /// This function advances `samples` forward, moving past the samples that have been processed.
    /// Trigger processing is done on groups of samples, and any samples not fitting into a group
    /// of implementation dependent size (currently 16) are left unprocessed.
    pub fn scan(&mut self, samples: &mut &[i8], filter: EdgeFilter) -> Option<Edge> {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            if is_x86_feature_detected!("avx2") {
                // SAFETY: The AVX2 function is called only if AVX2 is available, checked above.
                return unsafe { self.scan_avx2(samples, filter) }
            } else if is_x86_feature_detected!("avx") {
                // SAFETY: The AVX function is called only if AVX is available, checked above.
                return unsafe { self.scan_avx(samples, filter) }
            }
        }
        self.scan_generic(samples, filter)
    }

    /// Like `scan`, but returns the amount of consumed samples.
    pub fn find(&mut self, mut samples: &[i8], filter: EdgeFilter) -> (usize, Option<Edge>) {
        let len_before = samples.len();
        let edge_opt = self.scan(&mut samples, filter);
        let len_after = samples.len();
        (len_before - len_after, edge_opt)
    }

    /// Like `find`, but also processes the samples that do not fill a group, one at a time.
    pub fn find_all(&mut self, samples: &[i8], filter: EdgeFilter) -> (usize, Option<Edge>) {
        let (mut consumed, edge_opt) = self.find(samples, filter);
        if edge_opt.is_some() {
            return (consumed, edge_opt)
        }
        while let Some(&sample) = samples.get(consumed) {
            match (self.step(sample), filter) {
                (Some(Edge::Rising), EdgeFilter::Both | EdgeFilter::Rising) =>
                    return (consumed, Some(Edge::Rising)),
                (Some(Edge::Falling), EdgeFilter::Both | EdgeFilter::Falling) =>
                    return (consumed, Some(Edge::Falling)),
                _ => consumed += 1,
            }
        }
        (consumed, None)
    }

    fn step(&mut self, sample: i8) -> Option<Edge> {
        match self.state {
            State::Fresh => {
                self.state = if sample < self.level { State::Below } else { State::Above };
                None
            }
            State::Below if sample > self.above => {
                self.state = State::Above;
                Some(Edge::Rising)
            }
            State::Above if sample < self.below => {
                self.state = State::Below;
                Some(Edge::Falling)
            }
            _ => None
        }
    }
}

macro_rules! scan_impl {
    { $( $decl:tt )+ } => {
        #[inline(never)] // makes assembly more readable; serves no other purpose
        $( $decl )+(&mut self, samples: &mut &[i8], filter: EdgeFilter) -> Option<Edge> {
            use wide::{i8x16, CmpGt, CmpLt};

            fn scan_for<P: Fn(i8x16) -> i8x16>(samples: &mut &[i8], predicate: P) -> bool {
                let mut found = false;
                let mut offset = 0;
                for group in samples.chunks_exact(16) {
                    let mut lanes = [0i8; 16];
                    lanes.copy_from_slice(group);
                    let mask = predicate(i8x16::new(lanes));
                    // rustc generates ctlz even if the increment is within the condition; might
                    // as well lift it out of the condition
                    offset += (mask.move_mask() as u16).trailing_zeros() as usize;
                    if mask.any() {
                        found = true;
                        break
                    }
                }
                *samples = &samples[offset.min(samples.len())..];
                found
            }

            match (self.state, *samples) {
                (State::Fresh, []) =>
                    return None,
                (State::Fresh, [first_sample, next_samples @ ..]) => {
                    self.state = if *first_sample < self.level {
                        State::Below
                    } else {
                        State::Above
                    };
                    *samples = next_samples;
                }
                _ => ()
            }

            let above = i8x16::splat(self.above);
            let below = i8x16::splat(self.below);
            loop {
                let found = match self.state {
                    State::Fresh | State::Below => scan_for(samples, |group| group.cmp_gt(above)),
                    State::Above => scan_for(samples, |group| group.cmp_lt(below)),
                };
                if !found {
                    return None
                }
                self.state = match self.state {
                    State::Fresh | State::Below => State::Above, // rising edge
                    State::Above => State::Below, // falling edge
                };
                match (self.state, filter) {
                    (State::Above, EdgeFilter::Both | EdgeFilter::Rising) =>
                        return Some(Edge::Rising),
                    (State::Below, EdgeFilter::Both | EdgeFilter::Falling) =>
                        return Some(Edge::Falling),
                    _ => ()
                }
            }
        }
    }
}

impl Trigger {
    scan_impl! { fn scan_generic }
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    scan_impl! { #[target_feature(enable = "avx")]  unsafe fn scan_avx }
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    scan_impl! { #[target_feature(enable = "avx2")] unsafe fn scan_avx2 }
}

/// Where a software trigger was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerSamples {
    /// Samples shown before the trigger.
    pub pre: usize,
    /// End of the window the trigger was searched in.
    pub post: usize,
    /// Index of the sample that completed the edge.
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSearch {
    Found(TriggerSamples),
    /// No edge; show the middle of the buffer.
    Midpoint,
}

impl TriggerSearch {
    /// Samples to display out of a buffer of `len` samples.
    pub fn window(&self, len: usize, display_samples: usize) -> Range<usize> {
        let display_samples = display_samples.min(len);
        let start = match self {
            TriggerSearch::Found(found) => found.index - found.pre,
            TriggerSearch::Midpoint => (len - display_samples) / 2,
        };
        start..start + display_samples
    }
}

/// Post-capture edge search for models without a usable hardware trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftwareTrigger {
    pub level: i8,
    pub hysteresis: u8,
    pub slope: Slope,
    /// Pretrigger position as a fraction of the displayed samples.
    pub position: f64,
    pub display_samples: usize,
}

impl SoftwareTrigger {
    /// Samples looked at after a candidate edge.
    const CONFIRM_WINDOW: usize = 10;
    /// How many of them must continue the slope.
    const CONFIRM_THRESHOLD: usize = 7;

    pub fn new(level: i8, slope: Slope, position: f64, display_samples: usize) -> SoftwareTrigger {
        SoftwareTrigger { level, hysteresis: 0, slope, position, display_samples }
    }

    /// Search `samples` for an edge that leaves room for the display window around it.
    pub fn search(&self, samples: &[i8]) -> TriggerSearch {
        let len = samples.len();
        if self.display_samples >= len {
            log::debug!("search: {} samples cannot fill a window of {}", len, self.display_samples);
            return TriggerSearch::Midpoint
        }
        let pre = (self.position.clamp(0.0, 1.0) * self.display_samples as f64) as usize;
        let pre = pre.min(self.display_samples);
        let post = len - (self.display_samples - pre);
        let filter = EdgeFilter::from(self.slope);

        let mut trigger = Trigger::new(self.level, self.hysteresis);
        let mut index = pre;
        if let Some(&previous) = index.checked_sub(1).and_then(|i| samples.get(i)) {
            trigger.find_all(&[previous], filter);
        }
        while index < post {
            let (consumed, edge) = trigger.find_all(&samples[index..post], filter);
            index += consumed;
            if edge.is_none() {
                break
            }
            if self.confirm(samples, index) {
                let found = TriggerSamples { pre, post, index };
                log::debug!("search: {:?}", found);
                return TriggerSearch::Found(found)
            }
            index += 1;
        }
        log::debug!("search: no {:?} edge at {} in {}..{}", self.slope, self.level, pre, post);
        TriggerSearch::Midpoint
    }

    /// Reject glitches: most of the following samples have to stay on the new side.
    fn confirm(&self, samples: &[i8], index: usize) -> bool {
        let value = samples[index];
        let following = samples.iter().skip(index + 1).take(Self::CONFIRM_WINDOW);
        let continuing = match self.slope {
            Slope::Positive => following.filter(|&&sample| sample >= value).count(),
            Slope::Negative => following.filter(|&&sample| sample < value).count(),
        };
        continuing > Self::CONFIRM_THRESHOLD
    }
}

/// Reduce sample codes of `sample_size` bits to signed 8-bit values for edge scanning.
pub fn signed_samples(codes: &[u16], sample_size: u8) -> Vec<i8> {
    let shift = sample_size.saturating_sub(8) as u32;
    codes.iter().map(|&code| ((code >> shift) as u8 ^ 0x80) as i8).collect()
}

/// [`signed_samples`] for a single code.
pub fn signed_level(code: u16, sample_size: u8) -> i8 {
    let shift = sample_size.saturating_sub(8) as u32;
    ((code >> shift) as u8 ^ 0x80) as i8
}
