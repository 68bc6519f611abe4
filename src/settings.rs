//! Runtime state of a device session: what the user asked for and what was resolved from it.

use crate::spec::{LimitsId, ModelSpec, Slope, TriggerMode};

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MathMode {
    #[default]
    Add,
    /// Channel 1 minus channel 2.
    Sub12,
    /// Channel 2 minus channel 1.
    Sub21,
}

/// Per-channel mode: physical channels have a coupling, the derived channel a math operation.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    /// Index into `ModelSpec::couplings`.
    Coupling(usize),
    Math(MathMode),
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetSelector {
    Duration,
    #[default]
    Samplerate,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerateTarget {
    /// Samplerate requested by the user, in Hz.
    pub samplerate: f64,
    /// Record time requested by the user, in s.
    pub duration: f64,
    /// Which of the two was set last.
    pub selector: TargetSelector,
}

impl Default for SamplerateTarget {
    fn default() -> Self {
        SamplerateTarget { samplerate: 1e6, duration: 10e-3, selector: TargetSelector::Samplerate }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerateSettings {
    pub target: SamplerateTarget,
    pub limits: LimitsId,
    pub downsampler: u32,
    /// Resolved samplerate, in Hz.
    pub current: f64,
    /// Hardware id of the selected rate on fixed-samplerate models.
    pub fixed_id: Option<u8>,
}

impl Default for SamplerateSettings {
    fn default() -> Self {
        SamplerateSettings {
            target: SamplerateTarget::default(),
            limits: LimitsId::Normal,
            downsampler: 1,
            current: 1e8,
            fixed_id: None,
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerSettings {
    /// Trigger level for each channel, in V.
    pub level: Vec<f64>,
    /// Pretrigger position as a fraction of the record.
    pub position: f64,
    /// Pretrigger position in the encoding of the model's pretrigger command.
    pub point: u32,
    /// Post-trigger position, for models that encode it separately.
    pub point_post: u32,
    pub mode: TriggerMode,
    pub slope: Slope,
    /// `source` indexes `ModelSpec::special_trigger_channels` instead of the channels.
    pub special: bool,
    pub source: usize,
    /// Locate the trigger point in software even if the hardware could do it.
    pub software: bool,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoltageSettings {
    /// Requested offset in screen space, in units of the calibration voltage limit.
    pub offset: f64,
    /// `offset` after quantization to a hardware code.
    pub offset_real: f64,
    /// Raw code sent to the offset DAC.
    pub offset_code: u16,
    /// Index into `ModelSpec::gain`.
    pub gain: usize,
    pub used: bool,
    pub mode: ChannelMode,
}

impl VoltageSettings {
    fn physical() -> Self {
        VoltageSettings {
            offset: 0.0,
            offset_real: 0.0,
            offset_code: 0x8000,
            gain: 0,
            used: false,
            mode: ChannelMode::Coupling(0),
        }
    }

    fn math() -> Self {
        VoltageSettings { mode: ChannelMode::Math(MathMode::default()), ..Self::physical() }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ControlSettings {
    pub samplerate: SamplerateSettings,
    /// Physical channels.
    pub voltage: Vec<VoltageSettings>,
    /// The derived channel computed from the physical ones.
    pub math: VoltageSettings,
    pub trigger: TriggerSettings,
    pub record_length_id: usize,
    pub used_channels: usize,
    /// Extra samples requested so the software trigger has room to search.
    pub sw_sample_margin: u32,
}

impl ControlSettings {
    pub fn new(spec: &ModelSpec) -> ControlSettings {
        let record_length_id = if spec.normal_samplerate.len() > 1 { 1 } else { 0 };
        ControlSettings {
            samplerate: SamplerateSettings::default(),
            voltage: vec![VoltageSettings::physical(); spec.channels],
            math: VoltageSettings::math(),
            trigger: TriggerSettings {
                level: vec![0.0; spec.channels],
                position: 0.0,
                point: 0,
                point_post: 0,
                mode: TriggerMode::default(),
                slope: Slope::default(),
                special: false,
                source: 0,
                software: false,
            },
            record_length_id,
            used_channels: 0,
            sw_sample_margin: 2000,
        }
    }

    pub fn is_fast_rate(&self) -> bool {
        self.samplerate.limits == LimitsId::FastRate
    }

    /// Recount `used_channels` from the per-channel flags.
    pub fn update_used_channels(&mut self) {
        self.used_channels = self.voltage.iter().filter(|v| v.used).count();
    }

    pub fn coupling_index(&self, channel: usize) -> Option<usize> {
        match self.voltage.get(channel)?.mode {
            ChannelMode::Coupling(index) => Some(index),
            ChannelMode::Math(_) => None,
        }
    }
}
