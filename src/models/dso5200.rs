use crate::commands::Command;
use crate::limits::{RecordLength, SamplerateLimits};
use crate::protocol::BulkCode;
use crate::spec::{CommandCodes, ModelSpec};

pub const COMMANDS: &[Command] = &[
    Command::SetSamplerate5200,
    Command::SetBuffer5200,
    Command::SetTrigger5200,
];

// 10-bit samples; the top of the screen sits at a different code for each attenuator setting
const VOLTAGE_LIMITS: [f64; 9] = [368.0, 454.0, 908.0, 368.0, 454.0, 908.0, 368.0, 454.0, 908.0];

fn common(name: &'static str, record_lengths: [u32; 2]) -> ModelSpec {
    let mut spec = ModelSpec::new(name, 2);
    spec.commands = CommandCodes {
        set_channels: BulkCode::ESetTriggerOrSamplerate,
        set_samplerate: BulkCode::CSetTriggerOrSamplerate,
        set_record_length: BulkCode::DSetBuffer,
        set_trigger: BulkCode::ESetTriggerOrSamplerate,
        set_pretrigger: BulkCode::DSetBuffer,
        ..CommandCodes::default()
    };
    spec.normal_samplerate = SamplerateLimits {
        base: 100e6,
        max: 125e6,
        max_downsampler: 131072,
        record_lengths: vec![
            RecordLength::rolling(1000),
            RecordLength::fixed(record_lengths[0], 1),
            RecordLength::fixed(record_lengths[1], 1),
        ],
    };
    spec.fastrate_samplerate = SamplerateLimits {
        base: 200e6,
        max: 250e6,
        max_downsampler: 131072,
        record_lengths: vec![
            RecordLength::rolling(1000),
            RecordLength::fixed(record_lengths[0] * 2, 1),
            RecordLength::fixed(record_lengths[1] * 2, 1),
        ],
    };
    spec.sample_size = 10;
    spec.gain = super::gain_table([1, 0, 0, 1, 0, 0, 1, 0, 0]);
    spec.uniform_calibration(&VOLTAGE_LIMITS);
    spec.special_trigger_channels = super::external_triggers(&[("EXT", -2), ("EXT/10", -1)]);
    spec
}

pub fn dso5200() -> ModelSpec {
    common("DSO-5200", [10240, 14336])
}

pub fn dso5200a() -> ModelSpec {
    common("DSO-5200A", [10240, 14336])
}
