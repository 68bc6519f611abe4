//! Decoding of capture state responses and sample buffers.

use crate::calibration::SampleScale;
use crate::protocol::{decode_trigger_point, CaptureState};
use crate::settings::ControlSettings;
use crate::spec::ModelSpec;
use crate::trigger::TriggerSearch;
use crate::{Error, Result};

/// Size of the GetCaptureState response.
pub const CAPTURE_STATE_LENGTH: usize = 512;

/// Size of one rolling mode packet, unless the model overrides it.
const USB_PACKET_LENGTH: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureStatus {
    pub state: CaptureState,
    /// Sample at which the hardware trigger fired, counted from the start of the buffer.
    pub trigger_point: u32,
}

impl CaptureStatus {
    /// Status of models that do not report one; their data is always ready.
    pub fn always_ready() -> CaptureStatus {
        CaptureStatus { state: CaptureState::Ready, trigger_point: 0 }
    }

    /// Parse a GetCaptureState response: state in byte 0, gray coded trigger point in bytes
    /// 2 (low), 3 and 1 (high).
    pub fn parse(response: &[u8]) -> Result<CaptureStatus> {
        let &[state, high, low, mid, ..] = response else {
            return Err(Error::InvalidResponse("capture state too short"))
        };
        let state = CaptureState::from_code(state)
            .ok_or(Error::InvalidResponse("unknown capture state"))?;
        let raw = u32::from_le_bytes([low, mid, high, 0]);
        let status = CaptureStatus { state, trigger_point: decode_trigger_point(raw) };
        log::trace!("parse({:02x?}) = {:?}", &response[..4], status);
        Ok(status)
    }
}

/// Number of channels whose samples are in the data buffer.
pub fn data_channels(spec: &ModelSpec, settings: &ControlSettings) -> usize {
    if settings.is_fast_rate() { 1 } else { spec.channels }
}

/// Whether the edge is located in software for the current settings.
pub fn uses_software_trigger(spec: &ModelSpec, settings: &ControlSettings) -> bool {
    spec.has(crate::spec::Features::SOFTWARE_TRIGGER) || settings.trigger.software
}

/// Samples per channel the device delivers for one record, or `None` in rolling mode.
pub fn record_samples(spec: &ModelSpec, settings: &ControlSettings) -> Option<usize> {
    let record = spec.limits(settings.samplerate.limits)
        .record_lengths.get(settings.record_length_id)?;
    let mut samples = record.samples()? as usize;
    if uses_software_trigger(spec, settings) {
        samples += settings.sw_sample_margin as usize;
    }
    Some(samples)
}

/// Bytes to request with GetData.
pub fn receive_length(spec: &ModelSpec, settings: &ControlSettings) -> usize {
    match record_samples(spec, settings) {
        Some(samples) => {
            let bytes = samples * data_channels(spec, settings);
            // samples wider than a byte send their low bits in a second block
            if spec.sample_size > 8 { bytes * 2 } else { bytes }
        }
        None => spec.fixed_usb_in_length.unwrap_or(USB_PACKET_LENGTH),
    }
}

/// One acquired record, split by channel.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureData {
    /// Raw sample codes, one vector per channel; channels that were not sampled are empty.
    pub samples: Vec<Vec<u16>>,
    pub scales: Vec<SampleScale>,
    pub samplerate: f64,
    pub trigger_point: u32,
    /// Result of the software trigger, if it was used.
    pub trigger: Option<TriggerSearch>,
}

impl CaptureData {
    /// Split `raw` into channels. The device stores channels interleaved, last channel first,
    /// and the record starts `trigger_point` sample frames into the buffer.
    ///
    /// With samples wider than 8 bits the buffer holds one byte of high bits per sample,
    /// followed by the same number of bytes carrying the low bits of each frame, two bits
    /// per channel.
    pub fn decode(spec: &ModelSpec, settings: &ControlSettings, raw: &[u8], trigger_point: u32)
            -> Result<CaptureData> {
        let channels = data_channels(spec, settings);
        let wide = spec.sample_size > 8;
        let length = if wide { raw.len() / 2 } else { raw.len() };
        let length = length - length % channels;
        if length == 0 {
            return Err(Error::InvalidResponse("empty sample buffer"))
        }
        let (high, low) = raw.split_at(length.min(raw.len()));
        let low_bits = spec.sample_size.saturating_sub(8).min(2) as u32;

        let frames = length / channels;
        let start = (trigger_point as usize % frames) * channels;
        let mut samples = vec![Vec::new(); spec.channels];
        for (index, target) in sampled_channels(spec, settings).into_iter().enumerate() {
            let lane = channels - 1 - index;
            let channel = &mut samples[target];
            channel.reserve(frames);
            for frame in 0..frames {
                let position = (start + frame * channels + lane) % length;
                let mut code = high[position] as u16;
                if wide {
                    let frame_start = position - position % channels;
                    let extra = low.get(frame_start).copied().unwrap_or(0);
                    code = code << low_bits | (extra >> (2 * lane) & 0b11) as u16;
                }
                channel.push(code);
            }
        }

        let scales = (0..spec.channels)
            .map(|channel| SampleScale::new(spec, settings, channel))
            .collect();
        log::debug!("decode({} bytes, trigger point {}): {} frames of {} channels",
            raw.len(), trigger_point, frames, channels);
        Ok(CaptureData {
            samples,
            scales,
            samplerate: settings.samplerate.current,
            trigger_point,
            trigger: None,
        })
    }

    /// Samples of `channel` in volts.
    pub fn volts(&self, channel: usize) -> Option<Vec<f64>> {
        let scale = self.scales.get(channel)?;
        let samples = self.samples.get(channel)?;
        Some(samples.iter().map(|&code| scale.code_to_volts(code)).collect())
    }
}

/// Channels stored in the data buffer, in buffer lane order from the last lane.
fn sampled_channels(spec: &ModelSpec, settings: &ControlSettings) -> Vec<usize> {
    if settings.is_fast_rate() {
        // the one used channel gets the whole buffer
        let channel = settings.voltage.iter().position(|voltage| voltage.used).unwrap_or(0);
        vec![channel]
    } else {
        (0..spec.channels).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::models::Model;
    use crate::spec::LimitsId;

    #[test]
    fn test_parse_status() {
        let status = CaptureStatus::parse(&[2, 0x00, 0b110, 0x00]).unwrap();
        assert_eq!(status, CaptureStatus { state: CaptureState::Ready, trigger_point: 0b100 });
        let status = CaptureStatus::parse(&[1, 0x01, 0x00, 0x00, 0xaa]).unwrap();
        assert_eq!(status.state, CaptureState::Sampling);
        assert_eq!(status.trigger_point, 0x1ffff);
        assert!(matches!(CaptureStatus::parse(&[2, 0]), Err(Error::InvalidResponse(_))));
        assert!(matches!(CaptureStatus::parse(&[5, 0, 0, 0]), Err(Error::InvalidResponse(_))));
    }

    #[test]
    fn test_receive_length() {
        let spec = Model::Dso2250.spec();
        let mut settings = ControlSettings::new(&spec);
        assert_eq!(receive_length(&spec, &settings), 10240 * 2);
        settings.samplerate.limits = LimitsId::FastRate;
        assert_eq!(receive_length(&spec, &settings), 20480);
        settings.record_length_id = 0;
        assert_eq!(receive_length(&spec, &settings), 512);
        settings.trigger.software = true;
        settings.samplerate.limits = LimitsId::Normal;
        settings.record_length_id = 1;
        assert_eq!(receive_length(&spec, &settings), (10240 + 2000) * 2);

        let spec = Model::Dso5200.spec();
        let settings = ControlSettings::new(&spec);
        assert_eq!(receive_length(&spec, &settings), 10240 * 2 * 2);

        let spec = Model::Dso6022be.spec();
        let settings = ControlSettings::new(&spec);
        assert_eq!(receive_length(&spec, &settings), (10240 + 2000) * 2);
    }

    #[test]
    fn test_decode_interleaved() {
        let spec = Model::Dso2090.spec();
        let settings = ControlSettings::new(&spec);
        // channel 2 in the even bytes, channel 1 in the odd ones
        let raw = [20, 10, 21, 11, 22, 12, 23, 13];
        let data = CaptureData::decode(&spec, &settings, &raw, 0).unwrap();
        assert_eq!(data.samples, [vec![10, 11, 12, 13], vec![20, 21, 22, 23]]);
        let data = CaptureData::decode(&spec, &settings, &raw, 1).unwrap();
        assert_eq!(data.samples, [vec![11, 12, 13, 10], vec![21, 22, 23, 20]]);
        assert!(CaptureData::decode(&spec, &settings, &[], 0).is_err());
    }

    #[test]
    fn test_decode_fast_rate() {
        let spec = Model::Dso2090.spec();
        let mut settings = ControlSettings::new(&spec);
        settings.samplerate.limits = LimitsId::FastRate;
        settings.voltage[1].used = true;
        let data = CaptureData::decode(&spec, &settings, &[1, 2, 3, 4], 0).unwrap();
        assert!(data.samples[0].is_empty());
        assert_eq!(data.samples[1], [1, 2, 3, 4]);
    }

    #[test]
    fn test_decode_10bit() {
        let spec = Model::Dso5200.spec();
        let settings = ControlSettings::new(&spec);
        // two frames: high bytes, then one byte of low bits per frame
        let raw = [0x80, 0x40, 0x81, 0x41, 0b11_01, 0x00, 0b10_00, 0x00];
        let data = CaptureData::decode(&spec, &settings, &raw, 0).unwrap();
        assert_eq!(data.samples[0], [0x40 << 2 | 0b11, 0x41 << 2 | 0b10]);
        assert_eq!(data.samples[1], [0x80 << 2 | 0b01, 0x81 << 2 | 0b00]);
    }

    #[test]
    fn test_volts() {
        let spec = Model::Dso2090.spec();
        let mut settings = ControlSettings::new(&spec);
        settings.voltage[0].gain = 6;
        let data = CaptureData::decode(&spec, &settings, &[0, 255, 0, 0], 0).unwrap();
        let volts = data.volts(0).unwrap();
        assert!((volts[0] - 4.0).abs() < 1e-9);
        assert!((volts[1] + 4.0).abs() < 1e-9);
        assert_eq!(data.volts(5), None);
    }
}
