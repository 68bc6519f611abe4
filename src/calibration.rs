//! Mapping between physical quantities and the raw codes of the offset DAC, trigger
//! comparator and sample ADC.

use crate::settings::ControlSettings;
use crate::spec::{Coupling, GainStepCalibration, ModelSpec, DIVS_VOLTAGE};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedOffset {
    /// Raw code for the offset DAC.
    pub code: u16,
    /// The offset that `code` actually produces, in the same units as the request.
    pub real: f64,
}

fn code_range(cal: &GainStepCalibration) -> (f64, f64) {
    let start = cal.offset_start as f64;
    let end = (cal.offset_end as f64).max(start);
    (start, end)
}

/// Quantize a screen-space offset (in units of `voltage_limit`, `-voltage_limit` at the bottom
/// of the offset range and `+voltage_limit` at the top) to an offset DAC code.
pub fn resolve_offset(cal: &GainStepCalibration, offset: f64) -> ResolvedOffset {
    let (start, end) = code_range(cal);
    let limit = cal.voltage_limit;
    if !(limit > 0.0) || end == start {
        return ResolvedOffset { code: cal.offset_start, real: 0.0 }
    }
    let offset = offset.clamp(-limit, limit);
    let fraction = ((offset + cal.offset_correction + limit) / (2.0 * limit)).clamp(0.0, 1.0);
    let code = (start + fraction * (end - start)).round().clamp(start, end);
    let real = (code - start) / (end - start) * 2.0 * limit - limit - cal.offset_correction;
    ResolvedOffset { code: code as u16, real }
}

/// Fraction of the screen height, from the bottom, at which zero volts sit.
pub fn offset_fraction(cal: &GainStepCalibration, offset_real: f64) -> f64 {
    let limit = cal.voltage_limit;
    if !(limit > 0.0) {
        return 0.5
    }
    ((offset_real + limit) / (2.0 * limit)).clamp(0.0, 1.0)
}

/// Code for the trigger comparator that corresponds to `level` volts.
pub fn trigger_level_code(cal: &GainStepCalibration, offset_real: f64, gain: f64, level: f64)
        -> u16 {
    let (start, end) = code_range(cal);
    let screen = gain * DIVS_VOLTAGE;
    let above_bottom = if screen > 0.0 { level / screen } else { 0.0 };
    let fraction = offset_fraction(cal, offset_real) + above_bottom;
    (fraction * (end - start) + start).round().clamp(start, end) as u16
}

/// Index of the smallest gain step that is at least `volts_per_div`; the largest step if none is.
pub fn select_gain_step(spec: &ModelSpec, volts_per_div: f64) -> usize {
    spec.gain.iter()
        .position(|level| level.gain >= volts_per_div)
        .unwrap_or(spec.gain.len().saturating_sub(1))
}

/// Conversion between sample codes of one channel and volts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleScale {
    /// Voltage across the full screen height, in V.
    pub screen: f64,
    /// Sample code at the top of the screen.
    pub limit: f64,
    /// Fraction of the screen height at which zero volts sit.
    pub zero: f64,
    pub max_code: u16,
}

impl SampleScale {
    pub fn new(spec: &ModelSpec, settings: &ControlSettings, channel: usize) -> SampleScale {
        let voltage = &settings.voltage[channel];
        let cal = spec.gain_step_calibration(channel, voltage.gain);
        let gain = spec.gain.get(voltage.gain).map_or(1.0, |level| level.gain);
        SampleScale {
            screen: gain * DIVS_VOLTAGE,
            limit: cal.voltage_limit,
            zero: offset_fraction(&cal, voltage.offset_real),
            max_code: ((1u32 << spec.sample_size.min(16)) - 1) as u16,
        }
    }

    pub fn code_to_volts(&self, code: u16) -> f64 {
        (code as f64 / self.limit - self.zero) * self.screen
    }

    pub fn volts_to_code(&self, volts: f64) -> u16 {
        ((volts / self.screen + self.zero) * self.limit)
            .round()
            .clamp(0.0, self.max_code as f64) as u16
    }
}

/// State of the input relays of models with coupling relays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelayState {
    pub below_1v: [bool; 2],
    pub below_100mv: [bool; 2],
    pub coupling_dc: [bool; 2],
    pub trigger_ext: bool,
}

impl RelayState {
    pub fn new(spec: &ModelSpec, settings: &ControlSettings) -> RelayState {
        let mut relays = RelayState::default();
        for channel in 0..settings.voltage.len().min(2) {
            let gain = spec.gain.get(settings.voltage[channel].gain).map_or(0.0, |level| level.gain);
            relays.below_1v[channel] = gain < 1.0;
            relays.below_100mv[channel] = gain < 0.1;
            relays.coupling_dc[channel] = settings.coupling_index(channel)
                .and_then(|index| spec.couplings.get(index))
                .map_or(true, |&coupling| coupling != Coupling::AC);
        }
        relays.trigger_ext = settings.trigger.special;
        relays
    }
}
