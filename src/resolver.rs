//! Fits a samplerate or record time request into the discrete configurations a model supports.
//!
//! Resolution never fails: a request outside of what the hardware can do is clamped to the
//! nearest configuration that it can do. All results are computed without touching
//! [`ControlSettings`] and committed in one step by [`SamplerateResolution::apply`].

use crate::limits::{RecordLength, RecordLengthKind, SamplerateLimits};
use crate::protocol::TRIGGER_POSITION_MAX;
use crate::settings::{ControlSettings, TargetSelector};
use crate::spec::{DownsamplerRule, Features, LimitsId, ModelSpec};

/// Record length assumed for fixed-samplerate models when sizing a record time.
const FIXED_SAMPLERATE_RECORD: u32 = 10240;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerateResolution {
    pub limits: LimitsId,
    pub record_length_id: usize,
    pub downsampler: u32,
    pub samplerate: f64,
    pub fixed_id: Option<u8>,
}

impl SamplerateResolution {
    /// Commit the resolution, and the trigger point that depends on it.
    pub fn apply(self, spec: &ModelSpec, settings: &mut ControlSettings) {
        settings.samplerate.limits = self.limits;
        settings.samplerate.downsampler = self.downsampler;
        settings.samplerate.current = self.samplerate;
        settings.samplerate.fixed_id = self.fixed_id;
        settings.record_length_id = self.record_length_id;
        let (point, point_post) = trigger_point(spec, settings, settings.trigger.position);
        settings.trigger.point = point;
        settings.trigger.point_post = point_post;
    }

    pub fn record_length(&self, spec: &ModelSpec) -> Option<RecordLength> {
        spec.limits(self.limits).record_lengths.get(self.record_length_id).copied()
    }

    /// Duration of one record, or `None` in rolling mode.
    pub fn record_time(&self, spec: &ModelSpec) -> Option<f64> {
        let samples = self.record_length(spec)?.samples()?;
        Some(samples as f64 / self.samplerate)
    }
}

/// Resolve the current target of `settings` against `spec`.
pub fn resolve(spec: &ModelSpec, settings: &ControlSettings) -> SamplerateResolution {
    let target = &settings.samplerate.target;
    let resolution = match (target.selector, spec.has(Features::FIXED_SAMPLERATE)) {
        (TargetSelector::Samplerate, false) =>
            resolve_samplerate(spec, settings, target.samplerate),
        (TargetSelector::Duration, false) =>
            resolve_duration(spec, settings, target.duration),
        (TargetSelector::Samplerate, true) =>
            resolve_fixed_samplerate(spec, settings, target.samplerate),
        (TargetSelector::Duration, true) =>
            resolve_fixed_duration(spec, settings, target.duration),
    };
    log::debug!("resolve({:?}) = {:?}", target, resolution);
    resolution
}

/// Select record length `id` of the active limits and move the target into the range of that
/// record length, so that resolving keeps it. A record time the record length cannot produce
/// becomes a samplerate target at the nearest rate it can.
pub fn pin_record_length(spec: &ModelSpec, settings: &mut ControlSettings, id: usize) {
    settings.record_length_id = id;
    if spec.has(Features::FIXED_SAMPLERATE) {
        return
    }
    let limits = spec.limits(settings.samplerate.limits);
    let Some(record) = limits.record_lengths.get(id) else { return };
    let target = &mut settings.samplerate.target;
    let wanted = match target.selector {
        TargetSelector::Samplerate => sanitize(target.samplerate),
        TargetSelector::Duration => match record.kind {
            RecordLengthKind::Fixed(length) => length as f64 / sanitize(target.duration),
            RecordLengthKind::Rolling =>
                limits.samplerate_for_record_time(id, sanitize(target.duration)),
        },
    };
    let rate = reachable(limits, id, wanted);
    if rate != wanted {
        log::debug!("pin_record_length({}): target moved from {:.3} Hz to {:.3} Hz", id, wanted, rate);
        target.samplerate = rate;
        target.selector = TargetSelector::Samplerate;
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_nan() || value <= 0.0 {
        f64::MIN_POSITIVE
    } else {
        value.min(f64::MAX)
    }
}

fn preferred_id(limits: &SamplerateLimits, record_length_id: usize) -> usize {
    record_length_id.min(limits.len().saturating_sub(1))
}

/// `rate` limited to what record length `id` can reach.
fn reachable(limits: &SamplerateLimits, id: usize, rate: f64) -> f64 {
    rate.max(limits.min_samplerate(id)).min(limits.max_samplerate(id))
}

fn in_range(limits: &SamplerateLimits, id: usize, rate: f64) -> bool {
    rate >= limits.min_samplerate(id) && rate <= limits.max_samplerate(id)
}

fn resolve_samplerate(spec: &ModelSpec, settings: &ControlSettings, samplerate: f64)
        -> SamplerateResolution {
    let samplerate = sanitize(samplerate);
    let normal_id = preferred_id(&spec.normal_samplerate, settings.record_length_id);
    // fast rate only if the request is out of reach otherwise
    let fast_rate = spec.fast_rate_allowed(settings.used_channels) &&
        !spec.fastrate_samplerate.is_empty() &&
        samplerate > spec.normal_samplerate.max_samplerate(normal_id);
    let limits_id = if fast_rate { LimitsId::FastRate } else { LimitsId::Normal };
    let limits = spec.limits(limits_id);
    let preferred = preferred_id(limits, settings.record_length_id);
    fit(limits_id, limits, spec.downsampler_rule, preferred, false, |_id| samplerate)
}

fn resolve_duration(spec: &ModelSpec, settings: &ControlSettings, duration: f64)
        -> SamplerateResolution {
    let duration = sanitize(duration);
    let target_for = |limits: &SamplerateLimits, id: usize| {
        match limits.record_lengths[id].kind {
            RecordLengthKind::Fixed(length) => length as f64 / duration,
            RecordLengthKind::Rolling => limits.samplerate_for_record_time(id, duration),
        }
    };
    let normal_id = preferred_id(&spec.normal_samplerate, settings.record_length_id);
    let fast_rate = spec.fast_rate_allowed(settings.used_channels) &&
        !spec.fastrate_samplerate.is_empty() &&
        !spec.normal_samplerate.is_empty() &&
        target_for(&spec.normal_samplerate, normal_id) >
            spec.normal_samplerate.max_samplerate(normal_id);
    let limits_id = if fast_rate { LimitsId::FastRate } else { LimitsId::Normal };
    let limits = spec.limits(limits_id);
    let preferred = preferred_id(limits, settings.record_length_id);
    fit(limits_id, limits, spec.downsampler_rule, preferred, true, |id| target_for(limits, id))
}

/// Pick a record length and downsampler for `target`. The preferred record length is kept if
/// it can reach the target; otherwise the one that gets closest to it is used.
fn fit<F: Fn(usize) -> f64>(limits_id: LimitsId, limits: &SamplerateLimits, rule: DownsamplerRule,
                            preferred: usize, round_up: bool, target: F)
        -> SamplerateResolution {
    if limits.is_empty() {
        log::warn!("no record lengths in {:?} limits", limits_id);
        return SamplerateResolution {
            limits: limits_id,
            record_length_id: 0,
            downsampler: 1,
            samplerate: limits.max,
            fixed_id: None,
        }
    }

    let id = if in_range(limits, preferred, target(preferred)) {
        preferred
    } else {
        // rates span decades, so compare them on a log scale
        let distance = |id: usize| {
            let wanted = target(id);
            (reachable(limits, id, wanted) / wanted).ln().abs()
        };
        let mut best = preferred;
        for id in 0..limits.len() {
            if distance(id) < distance(best) {
                best = id;
            }
        }
        log::debug!("fit: record length {} cannot reach {:.3} Hz, using {}",
            preferred, target(preferred), best);
        best
    };

    let wanted = target(id);
    let rate = reachable(limits, id, wanted);
    if rate != wanted {
        log::warn!("fit: {:.3} Hz out of range, clamped to {:.3} Hz", wanted, rate);
    }
    let max_downsampler = limits.max_downsampler.max(1);
    let ideal = limits.compute_downsampler(id, rate);
    let downsampler = rule.snap(ideal, round_up)
        .clamp(1.0, max_downsampler as f64) as u32;
    SamplerateResolution {
        limits: limits_id,
        record_length_id: id,
        downsampler,
        samplerate: limits.samplerate(id, downsampler),
        fixed_id: None,
    }
}

fn fixed_resolution(spec: &ModelSpec, settings: &ControlSettings, index: usize)
        -> SamplerateResolution {
    let record_length_id = preferred_id(&spec.normal_samplerate, settings.record_length_id);
    match spec.fixed_sample_rates.get(index) {
        Some(rate) => SamplerateResolution {
            limits: LimitsId::Normal,
            record_length_id,
            downsampler: 1,
            samplerate: rate.samplerate,
            fixed_id: Some(rate.hardware_id),
        },
        None => SamplerateResolution {
            limits: LimitsId::Normal,
            record_length_id,
            downsampler: 1,
            samplerate: settings.samplerate.current,
            fixed_id: settings.samplerate.fixed_id,
        },
    }
}

fn resolve_fixed_samplerate(spec: &ModelSpec, settings: &ControlSettings, samplerate: f64)
        -> SamplerateResolution {
    let samplerate = sanitize(samplerate);
    let mut best = 0;
    for (index, rate) in spec.fixed_sample_rates.iter().enumerate() {
        let best_rate = spec.fixed_sample_rates[best].samplerate;
        if (rate.samplerate / samplerate).ln().abs() < (best_rate / samplerate).ln().abs() {
            best = index;
        }
    }
    fixed_resolution(spec, settings, best)
}

fn resolve_fixed_duration(spec: &ModelSpec, settings: &ControlSettings, duration: f64)
        -> SamplerateResolution {
    let duration = sanitize(duration);
    let id = preferred_id(&spec.normal_samplerate, settings.record_length_id);
    let samples = spec.normal_samplerate.record_lengths.get(id)
        .and_then(|record| record.samples())
        .unwrap_or(FIXED_SAMPLERATE_RECORD) as f64;
    // highest rate whose record still covers the duration; the slowest one if none does
    let mut best: Option<usize> = None;
    for (index, rate) in spec.fixed_sample_rates.iter().enumerate() {
        let fits = rate.samplerate * duration < samples;
        let better = match best {
            None => true,
            Some(best) => rate.samplerate > spec.fixed_sample_rates[best].samplerate,
        };
        if fits && better {
            best = Some(index);
        }
    }
    let slowest = (0..spec.fixed_sample_rates.len())
        .min_by(|&a, &b| {
            spec.fixed_sample_rates[a].samplerate.total_cmp(&spec.fixed_sample_rates[b].samplerate)
        })
        .unwrap_or(0);
    fixed_resolution(spec, settings, best.unwrap_or(slowest))
}

/// Encode the pretrigger `position` (fraction of the record) for the resolved configuration.
/// Returns the pre- and post-trigger values; rolling mode has no trigger position.
pub fn trigger_point(spec: &ModelSpec, settings: &ControlSettings, position: f64) -> (u32, u32) {
    let record = spec.limits(settings.samplerate.limits)
        .record_lengths.get(settings.record_length_id).copied();
    let length = match record.map(|record| record.kind) {
        Some(RecordLengthKind::Fixed(length)) => length,
        Some(RecordLengthKind::Rolling) | None => return (0x1, 0x0),
    };
    let mut position_samples = position.clamp(0.0, 1.0) * length as f64;
    if settings.is_fast_rate() {
        position_samples /= spec.channels as f64;
    }
    let position_samples = position_samples as u32;
    // both values count down from the end of the hardware buffer
    let pre = TRIGGER_POSITION_MAX.wrapping_sub(length).wrapping_add(position_samples);
    let post = TRIGGER_POSITION_MAX.wrapping_sub(position_samples);
    (pre, post)
}
