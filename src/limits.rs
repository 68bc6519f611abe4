//! Samplerate arithmetic over a model's base clock and its table of record lengths.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLengthKind {
    /// Samples are streamed continuously; there is no fixed buffer to size.
    Rolling,
    /// A fixed buffer of this many samples per channel.
    Fixed(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLength {
    pub kind: RecordLengthKind,
    pub buffer_divider: u32,
}

impl RecordLength {
    pub const fn rolling(buffer_divider: u32) -> Self {
        RecordLength { kind: RecordLengthKind::Rolling, buffer_divider }
    }

    pub const fn fixed(length: u32, buffer_divider: u32) -> Self {
        RecordLength { kind: RecordLengthKind::Fixed(length), buffer_divider }
    }

    pub fn is_rolling(&self) -> bool {
        matches!(self.kind, RecordLengthKind::Rolling)
    }

    /// Number of samples per channel, or `None` in rolling mode.
    pub fn samples(&self) -> Option<u32> {
        match self.kind {
            RecordLengthKind::Rolling => None,
            RecordLengthKind::Fixed(length) => Some(length),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerateLimits {
    /// Clock the downsampler divides, in Hz.
    pub base: f64,
    /// Highest samplerate reachable without downsampling, in Hz.
    pub max: f64,
    pub max_downsampler: u32,
    pub record_lengths: Vec<RecordLength>,
}

impl SamplerateLimits {
    // All queries below index `record_lengths` directly; the resolver only passes ids that
    // it took from this table.

    fn divider(&self, id: usize) -> f64 {
        self.record_lengths[id].buffer_divider as f64
    }

    pub fn min_samplerate(&self, id: usize) -> f64 {
        self.base / self.max_downsampler as f64 / self.divider(id)
    }

    pub fn samplerate(&self, id: usize, downsampler: u32) -> f64 {
        self.base / downsampler as f64 / self.divider(id)
    }

    /// Samplerate that fits `record_time` seconds into record length `id`.
    ///
    /// Unlike [`Self::samplerate`] this does not involve the base clock; the buffer divider is
    /// divided by the record time directly.
    pub fn samplerate_for_record_time(&self, id: usize, record_time: f64) -> f64 {
        self.divider(id) / record_time
    }

    pub fn max_samplerate(&self, id: usize) -> f64 {
        self.max / self.divider(id)
    }

    pub fn compute_downsampler(&self, id: usize, samplerate: f64) -> f64 {
        self.base / self.divider(id) / samplerate
    }

    pub fn len(&self) -> usize {
        self.record_lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record_lengths.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn dso2250_like() -> SamplerateLimits {
        SamplerateLimits {
            base: 100e6,
            max: 100e6,
            max_downsampler: 65536,
            record_lengths: vec![
                RecordLength::rolling(1000),
                RecordLength::fixed(10240, 1),
                RecordLength::fixed(524288, 1),
            ],
        }
    }

    #[test]
    fn test_min_max() {
        let limits = dso2250_like();
        assert_eq!(limits.max_samplerate(1), 100e6);
        assert_eq!(limits.max_samplerate(0), 100e3);
        assert!((limits.min_samplerate(1) - 100e6 / 65536.0).abs() < 1e-9);
        assert!((limits.min_samplerate(0) - 100e6 / 65536.0 / 1000.0).abs() < 1e-12);
    }

    #[test]
    fn test_downsampler_round_trip() {
        let limits = dso2250_like();
        for id in 0..limits.len() {
            for downsampler in [1, 2, 3, 5, 10, 999, 4096, 65536] {
                let samplerate = limits.samplerate(id, downsampler);
                let computed = limits.compute_downsampler(id, samplerate);
                assert!((computed - downsampler as f64).abs() < 1e-6,
                    "id {} downsampler {} came back as {}", id, downsampler, computed);
            }
        }
    }

    #[test]
    fn test_record_time_formula() {
        let limits = dso2250_like();
        assert_eq!(limits.samplerate_for_record_time(0, 0.5), 2000.0);
        assert_eq!(limits.samplerate_for_record_time(1, 1e-3), 1000.0);
    }

    #[test]
    fn test_record_length_kind() {
        let limits = dso2250_like();
        assert!(limits.record_lengths[0].is_rolling());
        assert_eq!(limits.record_lengths[0].samples(), None);
        assert_eq!(limits.record_lengths[2].samples(), Some(524288));
    }
}
