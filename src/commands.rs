//! Binary command encoders and the opcode-indexed registry that models customize.
//!
//! Every encoder reads the already resolved [`ControlSettings`] and produces a fixed-layout
//! record. Models install their variants with [`crate::Model::apply_requirements`]; the last
//! registration for an opcode wins.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};

use crate::calibration::{self, RelayState};
use crate::protocol::{BulkCode, ControlCode, Opcode, UsedChannels, TRIGGER_SOURCE_SPECIAL};
use crate::protocol::{CTriggerBits, ESamplerateBits, ETsrBits, GainBits, Tsr1Bits, Tsr2Bits};
use crate::settings::ControlSettings;
use crate::spec::{ModelSpec, Slope};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// 0x01: samplerate, record length, trigger and pretrigger in one record.
    SetTriggerAndSamplerate,
    ForceTrigger,
    StartSampling,
    EnableTrigger,
    GetData,
    GetCaptureState,
    SetGain,
    /// DSO-2250 0x0b.
    SetChannels2250,
    /// DSO-2250 0x0c.
    SetTrigger2250,
    /// DSO-2250 0x0d.
    SetRecordLength2250,
    /// DSO-2250 0x0e.
    SetSamplerate2250,
    /// DSO-2250 0x0f: pre- and post-trigger positions.
    SetBuffer2250,
    /// DSO-5200 0x0c.
    SetSamplerate5200,
    /// DSO-5200 0x0d: record length and trigger positions.
    SetBuffer5200,
    /// DSO-5200 0x0e: channels and trigger.
    SetTrigger5200,
    BeginCommand,
    SetOffset,
    SetRelays,
    /// DSO-6022BE gain of one channel.
    SetVoltDiv { channel: usize },
    /// DSO-6022BE samplerate.
    SetTimeDiv,
    /// DSO-6022BE capture request.
    AcquireHardData,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct SimpleRecord {
    code: u8,
    _reserved: u8,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct TriggerAndSamplerateRecord {
    code: u8,
    _reserved0: u8,
    tsr1: u8,
    tsr2: u8,
    downsampler: [u8; 2],
    trigger_position: [u8; 2],
    _reserved1: [u8; 2],
    trigger_position_high: u8,
    _reserved2: u8,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct GainRecord {
    code: u8,
    _reserved0: u8,
    gain: u8,
    _reserved1: [u8; 5],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ByteFieldRecord {
    code: u8,
    _reserved0: u8,
    value: u8,
    _reserved1: u8,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct TriggerRecord2250 {
    code: u8,
    _reserved0: u8,
    trigger: u8,
    _reserved1: [u8; 5],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct SamplerateRecord2250 {
    code: u8,
    _reserved0: u8,
    flags: u8,
    _reserved1: u8,
    samplerate: [u8; 2],
    _reserved2: [u8; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct BufferRecord2250 {
    code: u8,
    _reserved0: u8,
    trigger_position_pre: [u8; 3],
    _reserved1: u8,
    trigger_position_post: [u8; 3],
    _reserved2: [u8; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct SamplerateRecord5200 {
    code: u8,
    _reserved0: u8,
    samplerate_slow: [u8; 2],
    samplerate_fast: u8,
    _reserved1: u8,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct BufferRecord5200 {
    code: u8,
    _reserved0: u8,
    trigger_position_pre: [u8; 2],
    pre_used: u8,
    record_length: u8,
    trigger_position_post: [u8; 2],
    post_used: u8,
    _reserved1: u8,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct BeginCommandRecord {
    marker: u8,
    index: [u8; 3],
    _reserved: [u8; 6],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct OffsetRecord {
    channel_offsets: [[u8; 2]; 2],
    trigger_level: [u8; 2],
    _reserved: [u8; 11],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct RelayRecord {
    _reserved0: u8,
    below_1v_ch1: u8,
    below_100mv_ch1: u8,
    coupling_ch1: u8,
    below_1v_ch2: u8,
    below_100mv_ch2: u8,
    coupling_ch2: u8,
    trigger_ext: u8,
    _reserved1: [u8; 9],
}

fn to_vec<T: Pod>(record: &T) -> Vec<u8> {
    bytemuck::bytes_of(record).to_vec()
}

fn u24_le(value: u32) -> [u8; 3] {
    let [b0, b1, b2, _] = value.to_le_bytes();
    [b0, b1, b2]
}

/// Relay byte: `on` when the relay is active, its complement otherwise.
fn relay(active: bool, on: u8, off: u8) -> u8 {
    if active { on } else { off }
}

fn used_channels(settings: &ControlSettings, b_encoding: bool) -> UsedChannels {
    let used = |channel: usize| settings.voltage.get(channel).is_some_and(|v| v.used);
    UsedChannels::from_used(used(0), used(1), b_encoding)
}

fn slope_negative(settings: &ControlSettings) -> bool {
    settings.trigger.slope == Slope::Negative
}

/// Trigger source field shared by the DSO-2090 and DSO-5200 encodings: CH2 is 0, CH1 is 1
/// and every special channel is 3.
fn trigger_source(settings: &ControlSettings) -> u8 {
    let trigger = &settings.trigger;
    if trigger.special {
        TRIGGER_SOURCE_SPECIAL
    } else {
        1 - trigger.source.min(1) as u8
    }
}

fn gain_id(spec: &ModelSpec, settings: &ControlSettings, channel: usize) -> u8 {
    settings.voltage.get(channel)
        .and_then(|voltage| spec.gain.get(voltage.gain))
        .map_or(0, |level| level.hardware_id)
}

impl Command {
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::SetTriggerAndSamplerate => BulkCode::SetTriggerAndSamplerate.into(),
            Self::ForceTrigger => BulkCode::ForceTrigger.into(),
            Self::StartSampling => BulkCode::StartSampling.into(),
            Self::EnableTrigger => BulkCode::EnableTrigger.into(),
            Self::GetData => BulkCode::GetData.into(),
            Self::GetCaptureState => BulkCode::GetCaptureState.into(),
            Self::SetGain => BulkCode::SetGain.into(),
            Self::SetChannels2250 => BulkCode::BSetChannels.into(),
            Self::SetTrigger2250 | Self::SetSamplerate5200 =>
                BulkCode::CSetTriggerOrSamplerate.into(),
            Self::SetRecordLength2250 | Self::SetBuffer5200 => BulkCode::DSetBuffer.into(),
            Self::SetSamplerate2250 | Self::SetTrigger5200 =>
                BulkCode::ESetTriggerOrSamplerate.into(),
            Self::SetBuffer2250 => BulkCode::FSetBuffer.into(),
            Self::BeginCommand => ControlCode::BeginCommand.into(),
            Self::SetOffset => ControlCode::SetOffset.into(),
            Self::SetRelays => ControlCode::SetRelays.into(),
            Self::SetVoltDiv { channel: 0 } => ControlCode::SetVoltDivCh1.into(),
            Self::SetVoltDiv { .. } => ControlCode::SetVoltDivCh2.into(),
            Self::SetTimeDiv => ControlCode::SetTimeDiv.into(),
            Self::AcquireHardData => ControlCode::AcquireHardData.into(),
        }
    }

    /// Encode the payload of this command for the current settings.
    pub fn encode(&self, spec: &ModelSpec, settings: &ControlSettings) -> Vec<u8> {
        let code = match self.opcode() {
            Opcode::Bulk(code) => code as u8,
            Opcode::Control(code) => code as u8,
        };
        match self {
            Self::ForceTrigger | Self::StartSampling | Self::EnableTrigger |
            Self::GetData | Self::GetCaptureState =>
                to_vec(&SimpleRecord { code, _reserved: 0 }),
            Self::SetTriggerAndSamplerate =>
                encode_trigger_and_samplerate(spec, settings),
            Self::SetGain => {
                let mut gain = GainBits::empty();
                for channel in 0..spec.channels.min(4) {
                    gain = gain.with_channel(channel, gain_id(spec, settings, channel));
                }
                to_vec(&GainRecord { code, gain: gain.bits(), ..Zeroable::zeroed() })
            }
            Self::SetChannels2250 => {
                let value = used_channels(settings, true) as u8;
                to_vec(&ByteFieldRecord { code, value, ..Zeroable::zeroed() })
            }
            Self::SetTrigger2250 => {
                let source = if settings.trigger.special {
                    0
                } else {
                    2 + settings.trigger.source.min(1) as u8
                };
                let trigger = CTriggerBits::new(source, slope_negative(settings));
                to_vec(&TriggerRecord2250 { code, trigger: trigger.bits(), ..Zeroable::zeroed() })
            }
            Self::SetRecordLength2250 => {
                let value = settings.record_length_id as u8;
                to_vec(&ByteFieldRecord { code, value, ..Zeroable::zeroed() })
            }
            Self::SetSamplerate2250 => {
                let downsampler = settings.samplerate.downsampler;
                let mut flags = ESamplerateBits::empty();
                flags.set(ESamplerateBits::FastRate, settings.is_fast_rate());
                flags.set(ESamplerateBits::Downsampling, downsampler > 1);
                let samplerate =
                    if downsampler > 1 { 0x10001u32.wrapping_sub(downsampler) as u16 } else { 0 };
                to_vec(&SamplerateRecord2250 {
                    code,
                    flags: flags.bits(),
                    samplerate: samplerate.to_le_bytes(),
                    ..Zeroable::zeroed()
                })
            }
            Self::SetBuffer2250 =>
                to_vec(&BufferRecord2250 {
                    code,
                    trigger_position_pre: u24_le(settings.trigger.point),
                    trigger_position_post: u24_le(settings.trigger.point_post),
                    ..Zeroable::zeroed()
                }),
            Self::SetSamplerate5200 => {
                // the fast divider stays at 3 or 4 while the slow one does the rest
                let downsampler = settings.samplerate.downsampler.max(1);
                let slow = downsampler.saturating_sub(3) / 2;
                let fast = downsampler - slow * 2;
                let samplerate_slow = if slow == 0 { 0 } else { 0xffffu32.saturating_sub(slow) as u16 };
                to_vec(&SamplerateRecord5200 {
                    code,
                    samplerate_slow: samplerate_slow.to_le_bytes(),
                    samplerate_fast: 4u32.saturating_sub(fast) as u8,
                    ..Zeroable::zeroed()
                })
            }
            Self::SetBuffer5200 => {
                let pre = settings.trigger.point as u16;
                let post = settings.trigger.point_post as u16;
                to_vec(&BufferRecord5200 {
                    code,
                    trigger_position_pre: pre.to_le_bytes(),
                    pre_used: 0xff,
                    record_length: settings.record_length_id as u8,
                    trigger_position_post: post.to_le_bytes(),
                    post_used: 0xff,
                    ..Zeroable::zeroed()
                })
            }
            Self::SetTrigger5200 => {
                let tsr = ETsrBits::new(settings.is_fast_rate(), used_channels(settings, false),
                                        trigger_source(settings), slope_negative(settings));
                to_vec(&ByteFieldRecord { code, value: tsr.bits(), ..Zeroable::zeroed() })
            }
            Self::BeginCommand =>
                to_vec(&BeginCommandRecord { marker: 0x0f, index: [0x03; 3], _reserved: [0; 6] }),
            Self::SetOffset => encode_offset(spec, settings),
            Self::SetRelays => {
                let relays = RelayState::new(spec, settings);
                to_vec(&RelayRecord {
                    below_1v_ch1: relay(relays.below_1v[0], 0xfb, 0x04),
                    below_100mv_ch1: relay(relays.below_100mv[0], 0xf7, 0x08),
                    coupling_ch1: relay(relays.coupling_dc[0], 0xef, 0x10),
                    below_1v_ch2: relay(relays.below_1v[1], 0xfe, 0x01),
                    below_100mv_ch2: relay(relays.below_100mv[1], 0xfd, 0x02),
                    coupling_ch2: relay(relays.coupling_dc[1], 0xbf, 0x40),
                    trigger_ext: relay(relays.trigger_ext, 0xfe, 0x01),
                    ..Zeroable::zeroed()
                })
            }
            Self::SetVoltDiv { channel } => vec![gain_id(spec, settings, *channel)],
            Self::SetTimeDiv => {
                let id = settings.samplerate.fixed_id
                    .or_else(|| spec.fixed_sample_rates.first().map(|rate| rate.hardware_id))
                    .unwrap_or(0);
                vec![id]
            }
            Self::AcquireHardData => vec![0x01],
        }
    }
}

fn encode_trigger_and_samplerate(spec: &ModelSpec, settings: &ControlSettings) -> Vec<u8> {
    let downsampler = settings.samplerate.downsampler.max(1);
    // 1, 2 and 5 have their own samplerate ids, everything else goes through the even divider
    let (samplerate_id, downsampling, value) = match downsampler {
        1 | 2 => (downsampler as u8, false, 0u16),
        3..=5 => (3, false, 0xffff),
        _ => (0, true, 0x10001u32.wrapping_sub(downsampler >> 1) as u16),
    };
    let tsr1 = Tsr1Bits::new(trigger_source(settings), settings.record_length_id as u8,
                             samplerate_id, downsampling);
    let tsr2 = Tsr2Bits::new(used_channels(settings, false), settings.is_fast_rate(),
                             slope_negative(settings));
    let [position_low, position_mid, position_high, _] = settings.trigger.point.to_le_bytes();
    to_vec(&TriggerAndSamplerateRecord {
        code: BulkCode::SetTriggerAndSamplerate as u8,
        tsr1: tsr1.bits(),
        tsr2: tsr2.bits(),
        downsampler: value.to_le_bytes(),
        trigger_position: [position_low, position_mid],
        trigger_position_high: position_high,
        ..Zeroable::zeroed()
    })
}

fn encode_offset(spec: &ModelSpec, settings: &ControlSettings) -> Vec<u8> {
    let mut record = OffsetRecord::zeroed();
    for (channel, voltage) in settings.voltage.iter().enumerate().take(2) {
        record.channel_offsets[channel] = voltage.offset_code.to_be_bytes();
    }
    let source = settings.trigger.source.min(settings.voltage.len().saturating_sub(1));
    if let Some(voltage) = settings.voltage.get(source) {
        let cal = spec.gain_step_calibration(source, voltage.gain);
        let gain = spec.gain.get(voltage.gain).map_or(1.0, |level| level.gain);
        let level = settings.trigger.level.get(source).copied().unwrap_or(0.0);
        let code = calibration::trigger_level_code(&cal, voltage.offset_real, gain, level);
        record.trigger_level = code.to_be_bytes();
    }
    to_vec(&record)
}

/// Opcode to encoder table of one device session.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: HashMap<Opcode, Command>,
}

impl CommandRegistry {
    /// Registry with the encoders every bulk-protocol model starts from.
    pub fn defaults() -> CommandRegistry {
        let mut registry = CommandRegistry::default();
        for command in [
            Command::SetTriggerAndSamplerate,
            Command::ForceTrigger,
            Command::StartSampling,
            Command::EnableTrigger,
            Command::GetData,
            Command::GetCaptureState,
            Command::SetGain,
            Command::BeginCommand,
            Command::SetOffset,
            Command::SetRelays,
        ] {
            registry.register(command);
        }
        registry
    }

    /// Install `command` under its opcode, replacing whatever was there.
    pub fn register(&mut self, command: Command) {
        let opcode = command.opcode();
        if let Some(previous) = self.commands.insert(opcode, command) {
            if previous != command {
                log::trace!("register({:?}): replaces {:?}", command, previous);
            }
        }
    }

    pub fn get(&self, opcode: Opcode) -> Option<Command> {
        self.commands.get(&opcode).copied()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn encode(&self, opcode: Opcode, spec: &ModelSpec, settings: &ControlSettings)
            -> Result<Vec<u8>> {
        let command = self.get(opcode).ok_or(Error::UnsupportedCommand(opcode))?;
        let payload = command.encode(spec, settings);
        log::trace!("encode({:?}) = {:02x?}", command, payload);
        Ok(payload)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::models::Model;
    use crate::resolver;
    use crate::settings::TargetSelector;

    fn resolved(model: Model, samplerate: f64) -> (ModelSpec, ControlSettings) {
        let spec = model.spec();
        let mut settings = ControlSettings::new(&spec);
        settings.voltage[0].used = true;
        settings.voltage[1].used = true;
        settings.update_used_channels();
        settings.samplerate.target.samplerate = samplerate;
        settings.samplerate.target.selector = TargetSelector::Samplerate;
        resolver::resolve(&spec, &settings).apply(&spec, &mut settings);
        (spec, settings)
    }

    #[test]
    fn test_record_sizes() {
        assert_eq!(std::mem::size_of::<TriggerAndSamplerateRecord>(), 12);
        assert_eq!(std::mem::size_of::<GainRecord>(), 8);
        assert_eq!(std::mem::size_of::<TriggerRecord2250>(), 8);
        assert_eq!(std::mem::size_of::<SamplerateRecord2250>(), 8);
        assert_eq!(std::mem::size_of::<BufferRecord2250>(), 12);
        assert_eq!(std::mem::size_of::<BufferRecord5200>(), 10);
        assert_eq!(std::mem::size_of::<BeginCommandRecord>(), 10);
        assert_eq!(std::mem::size_of::<OffsetRecord>(), 17);
        assert_eq!(std::mem::size_of::<RelayRecord>(), 17);
    }

    #[test]
    fn test_missing_command() {
        let registry = CommandRegistry::default();
        let spec = Model::Dso2090.spec();
        let settings = ControlSettings::new(&spec);
        let opcode = Opcode::Bulk(BulkCode::GetData);
        assert!(matches!(registry.encode(opcode, &spec, &settings),
                         Err(Error::UnsupportedCommand(o)) if o == opcode));
    }

    #[test]
    fn test_override_and_idempotence() {
        let mut once = CommandRegistry::defaults();
        let before = once.len();
        Model::Dso2250.apply_requirements(&mut once);
        assert_eq!(once.get(BulkCode::ESetTriggerOrSamplerate.into()),
                   Some(Command::SetSamplerate2250));
        assert_eq!(once.get(BulkCode::GetData.into()), Some(Command::GetData));
        assert_eq!(once.len(), before + 5);

        let mut twice = once.clone();
        Model::Dso2250.apply_requirements(&mut twice);
        assert_eq!(once.commands, twice.commands);

        // a later model's table replaces the earlier one opcode by opcode
        Model::Dso5200.apply_requirements(&mut twice);
        assert_eq!(twice.get(BulkCode::ESetTriggerOrSamplerate.into()),
                   Some(Command::SetTrigger5200));
        assert_eq!(twice.get(BulkCode::BSetChannels.into()), Some(Command::SetChannels2250));
    }

    #[test]
    fn test_simple_payload() {
        let (spec, settings) = resolved(Model::Dso2090, 1e6);
        assert_eq!(Command::GetCaptureState.encode(&spec, &settings), [0x06, 0x00]);
        assert_eq!(Command::BeginCommand.encode(&spec, &settings),
                   [0x0f, 0x03, 0x03, 0x03, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_trigger_and_samplerate_payload() {
        let (spec, mut settings) = resolved(Model::Dso2090, 50e6);
        assert_eq!(settings.samplerate.downsampler, 1);
        let payload = Command::SetTriggerAndSamplerate.encode(&spec, &settings);
        assert_eq!(payload.len(), 12);
        assert_eq!(payload[0], 0x01);
        let tsr1 = Tsr1Bits::from_bits_retain(payload[2]);
        assert_eq!(tsr1.trigger_source(), 1);
        assert_eq!(tsr1.record_length(), 1);
        assert_eq!(tsr1.samplerate_id(), 1);
        assert!(!tsr1.contains(Tsr1Bits::Downsampling));
        assert_eq!(Tsr2Bits::from_bits_retain(payload[3]).used_channels(),
                   UsedChannels::Ch1Ch2 as u8);
        let position = settings.trigger.point;
        assert_eq!(payload[6..8], position.to_le_bytes()[0..2]);
        assert_eq!(payload[10], position.to_le_bytes()[2]);

        settings.samplerate.downsampler = 10;
        let payload = Command::SetTriggerAndSamplerate.encode(&spec, &settings);
        assert!(Tsr1Bits::from_bits_retain(payload[2]).contains(Tsr1Bits::Downsampling));
        assert_eq!(payload[4..6], ((0x10001u32 - 5) as u16).to_le_bytes()[..]);
    }

    #[test]
    fn test_special_trigger_source() {
        for model in [Model::Dso2090, Model::Dso2150, Model::Dso5200, Model::Dso5200A] {
            let (spec, mut settings) = resolved(model, 1e6);
            let source = |settings: &ControlSettings| {
                if spec.commands.set_trigger == BulkCode::ESetTriggerOrSamplerate {
                    Command::SetTrigger5200.encode(&spec, settings)[2] >> 3 & 0b11
                } else {
                    Tsr1Bits::from_bits_retain(
                        Command::SetTriggerAndSamplerate.encode(&spec, settings)[2]).trigger_source()
                }
            };
            let mut channels = Vec::new();
            for channel in 0..spec.channels {
                settings.trigger.special = false;
                settings.trigger.source = channel;
                channels.push(source(&settings));
            }
            assert_eq!(channels, [1, 0]);
            for special in 0..spec.special_trigger_channels.len() {
                settings.trigger.special = true;
                settings.trigger.source = special;
                let code = source(&settings);
                assert!(!channels.contains(&code), "{:?} special {} encodes as a channel", model, special);
            }
        }
    }

    #[test]
    fn test_2250_payloads() {
        let (spec, mut settings) = resolved(Model::Dso2250, 50e6);
        assert_eq!(Command::SetSamplerate2250.encode(&spec, &settings),
                   [0x0e, 0x00, 0b10, 0x00, 0xff, 0xff, 0x00, 0x00]);
        settings.trigger.point = 0x07d7ff;
        settings.trigger.point_post = 0x07ebff;
        assert_eq!(Command::SetBuffer2250.encode(&spec, &settings),
                   [0x0f, 0x00, 0xff, 0xd7, 0x07, 0x00, 0xff, 0xeb, 0x07, 0x00, 0x00, 0x00]);
        settings.voltage[0].used = false;
        assert_eq!(Command::SetChannels2250.encode(&spec, &settings),
                   [0x0b, 0x00, UsedChannels::BCh2 as u8, 0x00]);
    }

    #[test]
    fn test_5200_samplerate_split() {
        let (spec, mut settings) = resolved(Model::Dso5200, 1e6);
        settings.samplerate.downsampler = 1;
        assert_eq!(Command::SetSamplerate5200.encode(&spec, &settings), [0x0c, 0, 0, 0, 3, 0]);
        settings.samplerate.downsampler = 11;
        // slow 4, fast 3
        assert_eq!(Command::SetSamplerate5200.encode(&spec, &settings),
                   [0x0c, 0, 0xfb, 0xff, 1, 0]);
    }

    #[test]
    fn test_gain_payload() {
        let (spec, mut settings) = resolved(Model::Dso2250, 1e6);
        settings.voltage[0].gain = 1;
        settings.voltage[1].gain = 2;
        let payload = Command::SetGain.encode(&spec, &settings);
        let gain = GainBits::from_bits_retain(payload[2]);
        assert_eq!(gain.channel(0), spec.gain[1].hardware_id);
        assert_eq!(gain.channel(1), spec.gain[2].hardware_id);
    }

    #[test]
    fn test_offset_and_relays_payload() {
        let (spec, mut settings) = resolved(Model::Dso2250, 1e6);
        settings.voltage[0].offset_code = 0x1234;
        settings.voltage[1].offset_code = 0xabcd;
        settings.voltage[0].gain = 6;
        settings.voltage[1].gain = 0;
        let payload = Command::SetOffset.encode(&spec, &settings);
        assert_eq!(payload.len(), 17);
        assert_eq!(payload[0..4], [0x12, 0x34, 0xab, 0xcd]);
        let relays = Command::SetRelays.encode(&spec, &settings);
        assert_eq!(relays.len(), 17);
        assert_eq!(relays[1..8], [0x04, 0x08, 0xef, 0xfe, 0xfd, 0xbf, 0x01]);
    }

    #[test]
    fn test_6022_control_payloads() {
        let (spec, mut settings) = resolved(Model::Dso6022be, 1e6);
        settings.voltage[1].gain = 6;
        assert_eq!(Command::SetVoltDiv { channel: 1 }.opcode(),
                   Opcode::Control(ControlCode::SetVoltDivCh2));
        assert_eq!(Command::SetVoltDiv { channel: 1 }.encode(&spec, &settings),
                   [spec.gain[6].hardware_id]);
        assert_eq!(Command::SetTimeDiv.encode(&spec, &settings), [1]);
    }
}
