use crate::commands::Command;
use crate::limits::{RecordLength, SamplerateLimits};
use crate::protocol::BulkCode;
use crate::spec::{CommandCodes, ModelSpec};

pub const COMMANDS: &[Command] = &[
    Command::SetChannels2250,
    Command::SetTrigger2250,
    Command::SetRecordLength2250,
    Command::SetSamplerate2250,
    Command::SetBuffer2250,
    Command::SetOffset,
    Command::SetRelays,
];

pub fn dso2250() -> ModelSpec {
    let mut spec = ModelSpec::new("DSO-2250", 2);
    spec.commands = CommandCodes {
        set_channels: BulkCode::BSetChannels,
        set_samplerate: BulkCode::ESetTriggerOrSamplerate,
        set_record_length: BulkCode::DSetBuffer,
        set_trigger: BulkCode::CSetTriggerOrSamplerate,
        set_pretrigger: BulkCode::FSetBuffer,
        ..CommandCodes::default()
    };
    spec.normal_samplerate = SamplerateLimits {
        base: 100e6,
        max: 100e6,
        max_downsampler: 65536,
        record_lengths: vec![
            RecordLength::rolling(1000),
            RecordLength::fixed(10240, 1),
            RecordLength::fixed(524288, 1),
        ],
    };
    spec.fastrate_samplerate = SamplerateLimits {
        base: 200e6,
        max: 250e6,
        max_downsampler: 65536,
        record_lengths: vec![
            RecordLength::rolling(1000),
            RecordLength::fixed(20480, 1),
            RecordLength::fixed(1048576, 1),
        ],
    };
    spec.gain = super::gain_table([0, 2, 3, 0, 2, 3, 0, 2, 3]);
    spec.uniform_calibration(&[255.0; 9]);
    spec.special_trigger_channels = super::external_triggers(&[("EXT", -2)]);
    spec
}
