use crate::limits::{RecordLength, SamplerateLimits};
use crate::protocol::BulkCode;
use crate::spec::{CommandCodes, DownsamplerRule, ModelSpec};

const VOLTAGE_LIMITS: [f64; 9] = [255.0; 9];

/// Everything goes through the single SetTriggerAndSamplerate record.
fn commands() -> CommandCodes {
    CommandCodes {
        set_channels: BulkCode::SetTriggerAndSamplerate,
        set_samplerate: BulkCode::SetTriggerAndSamplerate,
        set_record_length: BulkCode::SetTriggerAndSamplerate,
        set_trigger: BulkCode::SetTriggerAndSamplerate,
        set_pretrigger: BulkCode::SetTriggerAndSamplerate,
        ..CommandCodes::default()
    }
}

fn common(name: &'static str, normal_max: f64, fast_max: f64) -> ModelSpec {
    let mut spec = ModelSpec::new(name, 2);
    spec.commands = commands();
    spec.normal_samplerate = SamplerateLimits {
        base: 50e6,
        max: normal_max,
        max_downsampler: 131072,
        record_lengths: vec![
            RecordLength::rolling(1000),
            RecordLength::fixed(10240, 1),
            RecordLength::fixed(32768, 1),
        ],
    };
    spec.fastrate_samplerate = SamplerateLimits {
        base: 100e6,
        max: fast_max,
        max_downsampler: 131072,
        record_lengths: vec![
            RecordLength::rolling(1000),
            RecordLength::fixed(20480, 1),
            RecordLength::fixed(65536, 1),
        ],
    };
    spec.downsampler_rule = DownsamplerRule::FastOrEven;
    spec.gain = super::gain_table([0, 1, 2, 0, 1, 2, 0, 1, 2]);
    spec.uniform_calibration(&VOLTAGE_LIMITS);
    spec.special_trigger_channels = super::external_triggers(&[("EXT", -2), ("EXT/10", -1)]);
    spec
}

pub fn dso2090() -> ModelSpec {
    common("DSO-2090", 50e6, 100e6)
}

pub fn dso2150() -> ModelSpec {
    common("DSO-2150", 75e6, 150e6)
}
