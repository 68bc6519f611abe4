use crate::commands::Command;
use crate::limits::{RecordLength, SamplerateLimits};
use crate::spec::{Coupling, Features, FixedSampleRate, ModelSpec};

pub const COMMANDS: &[Command] = &[
    Command::SetVoltDiv { channel: 0 },
    Command::SetVoltDiv { channel: 1 },
    Command::SetTimeDiv,
    Command::AcquireHardData,
];

/// Samplerate ids of the SetTimeDiv request; ids below 100 are in MS/s, the rest are
/// 10 kS/s units.
const SAMPLE_RATES: [(u8, f64); 10] = [
    (48, 48e6),
    (30, 30e6),
    (24, 24e6),
    (16, 16e6),
    (8,  8e6),
    (4,  4e6),
    (1,  1e6),
    (50, 500e3),
    (20, 200e3),
    (10, 100e3),
];

pub fn dso6022be() -> ModelSpec {
    let mut spec = ModelSpec::new("DSO-6022BE", 2);
    spec.normal_samplerate = SamplerateLimits {
        base: 48e6,
        max: 48e6,
        max_downsampler: 1,
        record_lengths: vec![RecordLength::fixed(10240, 1)],
    };
    spec.fixed_sample_rates = SAMPLE_RATES.into_iter()
        .map(|(hardware_id, samplerate)| FixedSampleRate { hardware_id, samplerate })
        .collect();
    spec.gain = super::gain_table([10, 10, 10, 10, 5, 2, 1, 1, 1]);
    spec.uniform_calibration(&[255.0; 9]);
    spec.couplings = vec![Coupling::DC];
    spec.features = Features::FIXED_SAMPLERATE | Features::SOFTWARE_TRIGGER | Features::CONTROL_ONLY;
    spec.fixed_usb_in_length = Some(16384);
    spec.test_signal_amplitude = 2.0;
    spec
}
