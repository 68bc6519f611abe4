//! Immutable description of what a connected oscilloscope model can do.

use bitflags::bitflags;

use crate::limits::SamplerateLimits;
use crate::protocol::BulkCode;

/// Number of vertical divisions on the screen.
pub const DIVS_VOLTAGE: f64 = 8.0;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Coupling {
    #[default]
    DC,
    AC,
    GND,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerMode {
    /// Use the hardware trigger, force one if it takes too long.
    #[default]
    HardwareSoftware,
    /// Wait for the hardware trigger; the user may force one.
    WaitForce,
    /// Capture a single triggered record and stop.
    Single,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Slope {
    #[default]
    Positive,
    Negative,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Features: u32 {
        /// Only the rates in `fixed_sample_rates` can be selected.
        const FIXED_SAMPLERATE = 1<<0;
        /// The hardware has no usable trigger; the trigger point is found in software.
        const SOFTWARE_TRIGGER = 1<<1;
        /// All configuration goes over control transfers; there are no bulk commands.
        const CONTROL_ONLY     = 1<<2;
        const CAPTURE_STATE    = 1<<3;
        const OFFSET           = 1<<4;
        const COUPLING_RELAYS  = 1<<5;
        const FAST_RATE        = 1<<6;
    }
}

impl Default for Features {
    fn default() -> Self {
        Features::CAPTURE_STATE | Features::OFFSET | Features::COUPLING_RELAYS | Features::FAST_RATE
    }
}

/// Which downsampler values the samplerate command of a model can express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownsamplerRule {
    /// Any integer in `1..=max_downsampler`.
    #[default]
    Any,
    /// 1, 2 and 5 through the fast field, even values through the slow field.
    FastOrEven,
}

impl DownsamplerRule {
    /// Snap an ideal, fractional downsampler to an encodable one. With `round_up` the result is
    /// never below `ideal` (samplerate never above the request), otherwise it is rounded to
    /// the nearest encodable value.
    pub fn snap(self, ideal: f64, round_up: bool) -> f64 {
        match self {
            DownsamplerRule::Any =>
                if round_up { ideal.ceil() } else { ideal.round() },
            DownsamplerRule::FastOrEven if ideal <= 5.0 => {
                let candidates: [f64; 4] = [1.0, 2.0, 5.0, 6.0];
                if round_up {
                    candidates.into_iter().find(|&c| c >= ideal).unwrap_or(6.0)
                } else {
                    nearest(&candidates, ideal)
                }
            }
            DownsamplerRule::FastOrEven =>
                if round_up { (ideal / 2.0).ceil() * 2.0 } else { (ideal / 2.0).round() * 2.0 },
        }
    }
}

fn nearest(candidates: &[f64], value: f64) -> f64 {
    candidates.iter().copied()
        .fold(f64::NAN, |best, c| {
            if best.is_nan() || (c - value).abs() < (best - value).abs() { c } else { best }
        })
}

/// Handle to one of the two limit sets of a [`ModelSpec`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LimitsId {
    #[default]
    Normal,
    FastRate,
}

/// Hardware opcode used for each abstract operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandCodes {
    pub set_channels: BulkCode,
    pub set_samplerate: BulkCode,
    pub set_record_length: BulkCode,
    pub set_trigger: BulkCode,
    pub set_pretrigger: BulkCode,
    pub force_trigger: BulkCode,
    pub capture_start: BulkCode,
    pub trigger_enabled: BulkCode,
    pub get_data: BulkCode,
    pub get_capture_state: BulkCode,
    pub set_gain: BulkCode,
}

impl Default for CommandCodes {
    fn default() -> Self {
        CommandCodes {
            set_channels: BulkCode::Invalid,
            set_samplerate: BulkCode::Invalid,
            set_record_length: BulkCode::Invalid,
            set_trigger: BulkCode::Invalid,
            set_pretrigger: BulkCode::Invalid,
            force_trigger: BulkCode::ForceTrigger,
            capture_start: BulkCode::StartSampling,
            trigger_enabled: BulkCode::EnableTrigger,
            get_data: BulkCode::GetData,
            get_capture_state: BulkCode::GetCaptureState,
            set_gain: BulkCode::SetGain,
        }
    }
}

impl CommandCodes {
    /// Distinct configuration opcodes, in the order they should be sent.
    pub fn configuration(&self) -> Vec<BulkCode> {
        let mut codes = Vec::new();
        for code in [
            self.set_channels,
            self.set_samplerate,
            self.set_record_length,
            self.set_trigger,
            self.set_pretrigger,
        ] {
            if code != BulkCode::Invalid && !codes.contains(&code) {
                codes.push(code);
            }
        }
        codes
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainLevel {
    /// Gain selector as the hardware understands it.
    pub hardware_id: u8,
    /// Vertical sensitivity, in V/div.
    pub gain: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedSampleRate {
    pub hardware_id: u8,
    pub samplerate: f64,
}

/// Calibration of one gain step of one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainStepCalibration {
    pub offset_correction: f64,
    /// Raw offset code at the bottom of the range.
    pub offset_start: u16,
    /// Raw offset code at the top of the range.
    pub offset_end: u16,
    /// Sample value at the top of the screen.
    pub voltage_limit: f64,
}

impl Default for GainStepCalibration {
    fn default() -> Self {
        GainStepCalibration {
            offset_correction: 0.0,
            offset_start: 0x0000,
            offset_end: 0xffff,
            voltage_limit: 255.0,
        }
    }
}

impl GainStepCalibration {
    pub const fn new(offset_start: u16, offset_end: u16, voltage_limit: f64) -> Self {
        GainStepCalibration { offset_correction: 0.0, offset_start, offset_end, voltage_limit }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialTriggerChannel {
    pub name: &'static str,
    pub hardware_id: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub name: &'static str,
    pub channels: usize,
    pub commands: CommandCodes,
    /// Limits with all channels in use.
    pub normal_samplerate: SamplerateLimits,
    /// Limits with at most `fast_rate_channels` channels in use.
    pub fastrate_samplerate: SamplerateLimits,
    pub fast_rate_channels: usize,
    pub downsampler_rule: DownsamplerRule,
    pub sample_size: u8,
    pub fixed_sample_rates: Vec<FixedSampleRate>,
    /// Indexed by channel, then by gain step.
    pub calibration: Vec<Vec<GainStepCalibration>>,
    pub gain: Vec<GainLevel>,
    pub special_trigger_channels: Vec<SpecialTriggerChannel>,
    pub couplings: Vec<Coupling>,
    pub trigger_modes: Vec<TriggerMode>,
    pub features: Features,
    /// Size of one rolling-mode packet, if the model does not use the USB packet size.
    pub fixed_usb_in_length: Option<usize>,
    /// Amplitude of the built-in test signal, in V.
    pub test_signal_amplitude: f64,
}

impl ModelSpec {
    /// Skeleton with the defaults shared by all models; factories fill in the rest.
    pub fn new(name: &'static str, channels: usize) -> ModelSpec {
        assert!(channels > 0);
        ModelSpec {
            name,
            channels,
            commands: CommandCodes::default(),
            normal_samplerate: SamplerateLimits {
                base: 50e6, max: 50e6, max_downsampler: 0, record_lengths: Vec::new(),
            },
            fastrate_samplerate: SamplerateLimits {
                base: 100e6, max: 100e6, max_downsampler: 0, record_lengths: Vec::new(),
            },
            fast_rate_channels: 1,
            downsampler_rule: DownsamplerRule::Any,
            sample_size: 8,
            fixed_sample_rates: Vec::new(),
            calibration: vec![Vec::new(); channels],
            gain: Vec::new(),
            special_trigger_channels: Vec::new(),
            couplings: vec![Coupling::DC, Coupling::AC],
            trigger_modes: vec![TriggerMode::HardwareSoftware, TriggerMode::WaitForce, TriggerMode::Single],
            features: Features::default(),
            fixed_usb_in_length: None,
            test_signal_amplitude: 1.0,
        }
    }

    pub fn limits(&self, id: LimitsId) -> &SamplerateLimits {
        match id {
            LimitsId::Normal => &self.normal_samplerate,
            LimitsId::FastRate => &self.fastrate_samplerate,
        }
    }

    pub fn has(&self, features: Features) -> bool {
        self.features.contains(features)
    }

    /// Whether fast-rate mode may be used with `used_channels` channels enabled.
    pub fn fast_rate_allowed(&self, used_channels: usize) -> bool {
        self.has(Features::FAST_RATE) && used_channels <= self.fast_rate_channels
    }

    /// Position of `mode` in `trigger_modes`; `trigger_modes.len()` if the model lacks it.
    pub fn index_of_trigger_mode(&self, mode: TriggerMode) -> usize {
        self.trigger_modes.iter().position(|&m| m == mode).unwrap_or(self.trigger_modes.len())
    }

    /// Calibration for `channel` at `gain_step`, or the neutral calibration if the table has
    /// no entry for it.
    pub fn gain_step_calibration(&self, channel: usize, gain_step: usize) -> GainStepCalibration {
        self.calibration.get(channel)
            .and_then(|steps| steps.get(gain_step))
            .copied()
            .unwrap_or_default()
    }

    /// Same voltage limits for every channel and gain step, with the full offset range.
    pub(crate) fn uniform_calibration(&mut self, voltage_limits: &[f64]) {
        let steps = voltage_limits.iter()
            .map(|&limit| GainStepCalibration::new(0x0000, 0xffff, limit))
            .collect::<Vec<_>>();
        self.calibration = vec![steps; self.channels];
    }
}
