use crate::calibration::{self, SampleScale};
use crate::capture::{self, CaptureData, CaptureStatus, CAPTURE_STATE_LENGTH};
use crate::commands::CommandRegistry;
use crate::models::Model;
use crate::protocol::{BulkCode, ControlCode, Opcode};
use crate::resolver;
use crate::settings::{ControlSettings, TargetSelector};
use crate::spec::{Coupling, Features, ModelSpec, Slope, TriggerMode};
use crate::transport::{Transfer, Transport};
use crate::trigger::{self, SoftwareTrigger};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Configuring,
    /// Sampling was started; the next poll begins waiting for data.
    Armed,
    Capturing,
    /// A record was returned; the device can be rearmed or reconfigured.
    Captured,
}

/// One oscilloscope session.
///
/// Every configuration change is computed on a copy of the settings, sent, and committed only
/// if every transfer succeeded.
#[derive(Debug)]
pub struct Device<T: Transport> {
    model: Model,
    spec: ModelSpec,
    registry: CommandRegistry,
    settings: ControlSettings,
    transport: T,
    phase: Phase,
}

impl<T: Transport> Device<T> {
    pub fn new(model: Model, transport: T) -> Device<T> {
        let spec = model.spec();
        let mut registry = if spec.has(Features::CONTROL_ONLY) {
            CommandRegistry::default()
        } else {
            CommandRegistry::defaults()
        };
        model.apply_requirements(&mut registry);
        let mut settings = ControlSettings::new(&spec);
        // a model must show something; start with the first channel enabled
        settings.voltage[0].used = true;
        derive_settings(&spec, &mut settings);
        log::debug!("new({}): {} commands registered", spec.name, registry.len());
        Device { model, spec, registry, settings, transport, phase: Phase::Idle }
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn settings(&self) -> &ControlSettings {
        &self.settings
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Replace the encoder table, e.g. to add a command for a model variant.
    pub fn registry_mut(&mut self) -> &mut CommandRegistry {
        &mut self.registry
    }

    /// Send the complete configuration for the current settings.
    pub fn configure(&mut self) -> Result<()> {
        self.update(|_spec, _settings| ())
    }

    /// Run one configuration pass: apply `change` to a copy of the settings, resolve it,
    /// send it, and commit it. On error the settings are left as they were.
    pub fn update<F: FnOnce(&ModelSpec, &mut ControlSettings)>(&mut self, change: F)
            -> Result<()> {
        if self.phase == Phase::Capturing {
            return Err(Error::Busy)
        }
        let previous = self.phase;
        self.phase = Phase::Configuring;
        let mut settings = self.settings.clone();
        change(&self.spec, &mut settings);
        derive_settings(&self.spec, &mut settings);
        let result = self.encode_configuration(&settings)
            .and_then(|transfers| self.send_all(&transfers));
        match result {
            Ok(()) => {
                self.settings = settings;
                self.phase = Phase::Idle;
                Ok(())
            }
            Err(error) => {
                log::warn!("update: {}", error);
                self.phase = previous;
                Err(error)
            }
        }
    }

    /// Request a samplerate; returns the one that was set.
    pub fn set_samplerate(&mut self, samplerate: f64) -> Result<f64> {
        log::debug!("set_samplerate({})", samplerate);
        self.update(|_spec, settings| {
            settings.samplerate.target.samplerate = samplerate;
            settings.samplerate.target.selector = TargetSelector::Samplerate;
        })?;
        Ok(self.settings.samplerate.current)
    }

    /// Request a record time; returns the samplerate that was set.
    pub fn set_record_time(&mut self, duration: f64) -> Result<f64> {
        log::debug!("set_record_time({})", duration);
        self.update(|_spec, settings| {
            settings.samplerate.target.duration = duration;
            settings.samplerate.target.selector = TargetSelector::Duration;
        })?;
        Ok(self.settings.samplerate.current)
    }

    /// Select a record length by its index into the model's record length table.
    pub fn set_record_length(&mut self, id: usize) -> Result<()> {
        log::debug!("set_record_length({})", id);
        let count = self.spec.limits(self.settings.samplerate.limits).len();
        if id >= count {
            log::warn!("set_record_length: only {} record lengths", count);
            return Ok(())
        }
        self.update(|spec, settings| resolver::pin_record_length(spec, settings, id))
    }

    pub fn set_channel_used(&mut self, channel: usize, used: bool) -> Result<()> {
        log::debug!("set_channel_used({}, {})", channel, used);
        self.update(|_spec, settings| {
            if let Some(voltage) = settings.voltage.get_mut(channel) {
                voltage.used = used;
            }
        })
    }

    /// Select the smallest gain of at least `volts_per_div`; returns the gain that was set.
    pub fn set_gain(&mut self, channel: usize, volts_per_div: f64) -> Result<f64> {
        log::debug!("set_gain({}, {})", channel, volts_per_div);
        let step = calibration::select_gain_step(&self.spec, volts_per_div);
        self.update(|_spec, settings| {
            if let Some(voltage) = settings.voltage.get_mut(channel) {
                voltage.gain = step;
            }
        })?;
        Ok(self.spec.gain.get(step).map_or(0.0, |level| level.gain))
    }

    /// Set the screen-space offset of `channel`; returns the offset the hardware can produce.
    pub fn set_offset(&mut self, channel: usize, offset: f64) -> Result<f64> {
        log::debug!("set_offset({}, {})", channel, offset);
        if !self.spec.has(Features::OFFSET) {
            log::warn!("set_offset: {} has no offset control", self.spec.name);
        }
        self.update(|_spec, settings| {
            if let Some(voltage) = settings.voltage.get_mut(channel) {
                voltage.offset = offset;
            }
        })?;
        Ok(self.settings.voltage.get(channel).map_or(0.0, |voltage| voltage.offset_real))
    }

    pub fn set_coupling(&mut self, channel: usize, coupling: Coupling) -> Result<()> {
        log::debug!("set_coupling({}, {:?})", channel, coupling);
        let Some(index) = self.spec.couplings.iter().position(|&c| c == coupling) else {
            log::warn!("set_coupling: {} does not support {:?}", self.spec.name, coupling);
            return Ok(())
        };
        self.update(|_spec, settings| {
            if let Some(voltage) = settings.voltage.get_mut(channel) {
                voltage.mode = crate::settings::ChannelMode::Coupling(index);
            }
        })
    }

    pub fn set_trigger_mode(&mut self, mode: TriggerMode) -> Result<()> {
        log::debug!("set_trigger_mode({:?})", mode);
        let mode = if self.spec.index_of_trigger_mode(mode) < self.spec.trigger_modes.len() {
            mode
        } else {
            log::warn!("set_trigger_mode: {} does not support {:?}", self.spec.name, mode);
            self.spec.trigger_modes.first().copied().unwrap_or_default()
        };
        self.update(|_spec, settings| settings.trigger.mode = mode)
    }

    /// Trigger on channel `source`, or on special trigger channel `source` if `special`.
    pub fn set_trigger_source(&mut self, special: bool, source: usize) -> Result<()> {
        log::debug!("set_trigger_source({}, {})", special, source);
        let count = if special { self.spec.special_trigger_channels.len() } else { self.spec.channels };
        if source >= count {
            log::warn!("set_trigger_source: no source {}", source);
            return Ok(())
        }
        self.update(|_spec, settings| {
            settings.trigger.special = special;
            settings.trigger.source = source;
        })
    }

    pub fn set_trigger_level(&mut self, channel: usize, level: f64) -> Result<()> {
        log::debug!("set_trigger_level({}, {})", channel, level);
        self.update(|_spec, settings| {
            if let Some(value) = settings.trigger.level.get_mut(channel) {
                *value = level;
            }
        })
    }

    pub fn set_trigger_slope(&mut self, slope: Slope) -> Result<()> {
        log::debug!("set_trigger_slope({:?})", slope);
        self.update(|_spec, settings| settings.trigger.slope = slope)
    }

    /// Set the pretrigger position as a fraction of the record.
    pub fn set_pretrigger_position(&mut self, position: f64) -> Result<()> {
        log::debug!("set_pretrigger_position({})", position);
        let position = if position.is_nan() { 0.0 } else { position.clamp(0.0, 1.0) };
        self.update(|_spec, settings| settings.trigger.position = position)
    }

    /// Locate the trigger in software even if the hardware could do it.
    pub fn set_software_trigger(&mut self, software: bool) -> Result<()> {
        log::debug!("set_software_trigger({})", software);
        self.update(|_spec, settings| settings.trigger.software = software)
    }

    /// Start sampling with the committed configuration.
    pub fn arm(&mut self) -> Result<()> {
        log::debug!("arm() in {:?}", self.phase);
        if self.phase == Phase::Capturing {
            return Err(Error::Busy)
        }
        if !self.spec.has(Features::CONTROL_ONLY) {
            let mut transfers = Vec::new();
            self.push_bulk(&mut transfers, self.spec.commands.capture_start, &self.settings)?;
            self.push_bulk(&mut transfers, self.spec.commands.trigger_enabled, &self.settings)?;
            self.send_all(&transfers)?;
        }
        self.phase = Phase::Armed;
        Ok(())
    }

    /// Make the hardware trigger fire now.
    pub fn force_trigger(&mut self) -> Result<()> {
        log::debug!("force_trigger() in {:?}", self.phase);
        if self.spec.has(Features::CONTROL_ONLY) {
            log::warn!("force_trigger: {} has no hardware trigger", self.spec.name);
            return Ok(())
        }
        if !matches!(self.phase, Phase::Armed | Phase::Capturing) {
            log::warn!("force_trigger: not armed ({:?})", self.phase);
            return Ok(())
        }
        let mut transfers = Vec::new();
        self.push_bulk(&mut transfers, self.spec.commands.force_trigger, &self.settings)?;
        self.send_all(&transfers)
    }

    /// Check for a finished record; returns it once it is available.
    pub fn poll(&mut self) -> Result<Option<CaptureData>> {
        match self.phase {
            Phase::Armed => self.phase = Phase::Capturing,
            Phase::Capturing => (),
            _ => return Ok(None),
        }

        let status = if self.spec.has(Features::CAPTURE_STATE) {
            let mut transfers = Vec::new();
            self.push_bulk(&mut transfers, self.spec.commands.get_capture_state, &self.settings)?;
            self.send_all(&transfers)?;
            CaptureStatus::parse(&self.transport.receive_bulk(CAPTURE_STATE_LENGTH)?)?
        } else {
            CaptureStatus::always_ready()
        };
        log::debug!("poll() = {:?}", status);
        if !status.state.is_ready() {
            return Ok(None)
        }

        let mut transfers = Vec::new();
        if self.spec.has(Features::CONTROL_ONLY) {
            self.push_control(&mut transfers, ControlCode::AcquireHardData, &self.settings)?;
        } else {
            self.push_bulk(&mut transfers, self.spec.commands.get_data, &self.settings)?;
        }
        self.send_all(&transfers)?;
        let length = capture::receive_length(&self.spec, &self.settings);
        let raw = self.transport.receive_bulk(length)?;
        let mut data = CaptureData::decode(&self.spec, &self.settings, &raw, status.trigger_point)?;
        data.trigger = self.software_trigger().map(|(channel, trigger)| {
            let samples = trigger::signed_samples(&data.samples[channel], self.spec.sample_size);
            trigger.search(&samples)
        });
        self.phase = Phase::Captured;
        Ok(Some(data))
    }

    /// Abandon any capture in progress. The settings are kept.
    pub fn reset(&mut self) {
        log::debug!("reset() in {:?}", self.phase);
        self.phase = Phase::Idle;
    }

    /// Source channel and search parameters, if the trigger is located in software.
    fn software_trigger(&self) -> Option<(usize, SoftwareTrigger)> {
        let settings = &self.settings;
        if !capture::uses_software_trigger(&self.spec, settings) || settings.trigger.special {
            return None
        }
        let display_samples = self.spec.limits(settings.samplerate.limits)
            .record_lengths.get(settings.record_length_id)?
            .samples()? as usize;
        let channel = settings.trigger.source.min(self.spec.channels - 1);
        let scale = SampleScale::new(&self.spec, settings, channel);
        let level = settings.trigger.level.get(channel).copied().unwrap_or(0.0);
        let level = trigger::signed_level(scale.volts_to_code(level), self.spec.sample_size);
        Some((channel, SoftwareTrigger::new(level, settings.trigger.slope,
                                            settings.trigger.position, display_samples)))
    }

    fn encode_configuration(&self, settings: &ControlSettings) -> Result<Vec<Transfer>> {
        let mut transfers = Vec::new();
        if self.spec.has(Features::CONTROL_ONLY) {
            for channel in 0..self.spec.channels.min(2) {
                let code = if channel == 0 { ControlCode::SetVoltDivCh1 } else { ControlCode::SetVoltDivCh2 };
                self.push_control(&mut transfers, code, settings)?;
            }
            self.push_control(&mut transfers, ControlCode::SetTimeDiv, settings)?;
            return Ok(transfers)
        }
        for code in self.spec.commands.configuration() {
            self.push_bulk(&mut transfers, code, settings)?;
        }
        self.push_bulk(&mut transfers, self.spec.commands.set_gain, settings)?;
        if self.spec.has(Features::OFFSET) {
            self.push_control(&mut transfers, ControlCode::SetOffset, settings)?;
        }
        if self.spec.has(Features::COUPLING_RELAYS) {
            self.push_control(&mut transfers, ControlCode::SetRelays, settings)?;
        }
        Ok(transfers)
    }

    /// Queue a bulk command, announced by the BeginCommand control request.
    fn push_bulk(&self, transfers: &mut Vec<Transfer>, code: BulkCode, settings: &ControlSettings)
            -> Result<()> {
        self.push_control(transfers, ControlCode::BeginCommand, settings)?;
        let payload = self.registry.encode(Opcode::Bulk(code), &self.spec, settings)?;
        log::debug!("push_bulk({:?})", code);
        transfers.push(Transfer::Bulk(payload));
        Ok(())
    }

    fn push_control(&self, transfers: &mut Vec<Transfer>, code: ControlCode,
                    settings: &ControlSettings) -> Result<()> {
        let payload = self.registry.encode(Opcode::Control(code), &self.spec, settings)?;
        log::debug!("push_control({:?})", code);
        transfers.push(Transfer::Control(code, payload));
        Ok(())
    }

    fn send_all(&mut self, transfers: &[Transfer]) -> Result<()> {
        for transfer in transfers {
            transfer.send(&mut self.transport)?;
        }
        Ok(())
    }
}

/// Everything that follows from the user-facing settings: channel count, samplerate and
/// record length, trigger point, and quantized offsets.
fn derive_settings(spec: &ModelSpec, settings: &mut ControlSettings) {
    settings.update_used_channels();
    resolver::resolve(spec, settings).apply(spec, settings);
    for (channel, voltage) in settings.voltage.iter_mut().enumerate() {
        let cal = spec.gain_step_calibration(channel, voltage.gain);
        let offset = calibration::resolve_offset(&cal, voltage.offset);
        voltage.offset_code = offset.code;
        voltage.offset_real = offset.real;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transport::RecordingTransport;

    fn bulk_codes(transfers: &[Transfer]) -> Vec<u8> {
        transfers.iter()
            .filter_map(|transfer| match transfer {
                Transfer::Bulk(data) => data.first().copied(),
                Transfer::Control(..) => None,
            })
            .collect()
    }

    fn control_codes(transfers: &[Transfer]) -> Vec<ControlCode> {
        transfers.iter()
            .filter_map(|transfer| match transfer {
                Transfer::Control(code, _) => Some(*code),
                Transfer::Bulk(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_configure_2250() {
        let mut device = Device::new(Model::Dso2250, RecordingTransport::new());
        device.configure().unwrap();
        let sent = device.transport_mut().take_sent();
        assert_eq!(bulk_codes(&sent), [0x0b, 0x0e, 0x0d, 0x0c, 0x0f, 0x07]);
        let controls = control_codes(&sent);
        assert_eq!(controls.iter().filter(|&&c| c == ControlCode::BeginCommand).count(), 6);
        assert_eq!(controls[controls.len() - 2..], [ControlCode::SetOffset, ControlCode::SetRelays]);
        assert_eq!(device.phase(), Phase::Idle);
    }

    #[test]
    fn test_configure_6022_control_only() {
        let mut device = Device::new(Model::Dso6022be, RecordingTransport::new());
        device.set_samplerate(1e6).unwrap();
        let sent = device.transport_mut().take_sent();
        assert_eq!(sent, [
            Transfer::Control(ControlCode::SetVoltDivCh1, vec![10]),
            Transfer::Control(ControlCode::SetVoltDivCh2, vec![10]),
            Transfer::Control(ControlCode::SetTimeDiv, vec![1]),
        ]);
    }

    #[test]
    fn test_set_samplerate_end_to_end() {
        let mut device = Device::new(Model::Dso2250, RecordingTransport::new());
        device.set_channel_used(1, true).unwrap();
        assert_eq!(device.set_samplerate(50e6).unwrap(), 50e6);
        assert_eq!(device.settings().samplerate.downsampler, 2);
        assert_eq!(device.settings().record_length_id, 1);
        assert_eq!(device.settings().used_channels, 2);
    }

    #[test]
    fn test_set_record_length_rolling() {
        let mut device = Device::new(Model::Dso2250, RecordingTransport::new());
        device.set_samplerate(1e6).unwrap();
        assert_eq!(device.settings().record_length_id, 1);
        device.set_record_length(0).unwrap();
        assert_eq!(device.settings().record_length_id, 0);
        assert_eq!(device.settings().samplerate.current, 100e3);
        assert_eq!(capture::receive_length(device.spec(), device.settings()), 512);
        // a later samplerate request may leave rolling mode again
        device.set_samplerate(1e6).unwrap();
        assert_eq!(device.settings().record_length_id, 1);
    }

    #[test]
    fn test_force_trigger_ignored() {
        let mut device = Device::new(Model::Dso2090, RecordingTransport::new());
        device.configure().unwrap();
        device.transport_mut().take_sent();
        device.force_trigger().unwrap();
        assert!(device.transport().sent().is_empty());
        device.arm().unwrap();
        device.transport_mut().take_sent();
        device.force_trigger().unwrap();
        assert_eq!(bulk_codes(device.transport().sent()), [BulkCode::ForceTrigger as u8]);

        let mut device = Device::new(Model::Dso6022be, RecordingTransport::new());
        device.arm().unwrap();
        device.force_trigger().unwrap();
        assert!(device.transport().sent().is_empty());
        assert_eq!(device.phase(), Phase::Armed);
    }

    #[test]
    fn test_transport_failure_keeps_settings() {
        let mut device = Device::new(Model::Dso2250, RecordingTransport::new());
        device.configure().unwrap();
        let before = device.settings().clone();
        device.transport_mut().fail_after(Some(3));
        assert!(matches!(device.set_samplerate(10e6), Err(Error::Transport(_))));
        assert_eq!(device.settings(), &before);
        device.transport_mut().fail_after(None);
        assert_eq!(device.set_samplerate(10e6).unwrap(), 10e6);
    }

    #[test]
    fn test_unsupported_command() {
        let mut device = Device::new(Model::Dso2250, RecordingTransport::new());
        *device.registry_mut() = CommandRegistry::defaults();
        let before = device.settings().clone();
        assert!(matches!(device.set_gain(0, 1.0),
                         Err(Error::UnsupportedCommand(Opcode::Bulk(BulkCode::BSetChannels)))));
        assert_eq!(device.settings(), &before);
        assert!(device.transport().sent().is_empty());
    }

    #[test]
    fn test_offset_and_gain() {
        let mut device = Device::new(Model::Dso2090, RecordingTransport::new());
        assert_eq!(device.set_gain(0, 0.3).unwrap(), 0.5);
        assert_eq!(device.settings().voltage[0].gain, 5);
        let real = device.set_offset(0, 100.0).unwrap();
        assert!((real - 100.0).abs() < 0.01);
        assert_ne!(device.settings().voltage[0].offset_code, 0x8000);
    }

    #[test]
    fn test_unsupported_coupling_is_ignored() {
        let mut device = Device::new(Model::Dso6022be, RecordingTransport::new());
        device.set_coupling(0, Coupling::AC).unwrap();
        assert_eq!(device.settings().coupling_index(0), Some(0));
        assert!(device.transport().sent().is_empty());
    }

    #[test]
    fn test_capture_cycle() {
        let mut device = Device::new(Model::Dso2090, RecordingTransport::new());
        device.set_channel_used(1, true).unwrap();
        device.set_samplerate(1e6).unwrap();
        device.arm().unwrap();
        assert_eq!(device.phase(), Phase::Armed);

        device.transport_mut().queue_response([1, 0, 0, 0]); // sampling
        assert_eq!(device.poll().unwrap(), None);
        assert_eq!(device.phase(), Phase::Capturing);
        assert!(matches!(device.set_samplerate(2e6), Err(Error::Busy)));
        assert!(matches!(device.arm(), Err(Error::Busy)));

        device.transport_mut().queue_response([2, 0, 0, 0]); // ready, trigger at 0
        device.transport_mut().queue_response(vec![0x80; 10240 * 2]);
        let data = device.poll().unwrap().unwrap();
        assert_eq!(data.samples[0].len(), 10240);
        assert_eq!(data.samples[1].len(), 10240);
        assert_eq!(data.trigger, None);
        assert_eq!(device.phase(), Phase::Captured);

        device.set_samplerate(2e6).unwrap();
        assert_eq!(device.phase(), Phase::Idle);
    }

    #[test]
    fn test_reset_keeps_settings() {
        let mut device = Device::new(Model::Dso2090, RecordingTransport::new());
        device.set_samplerate(1e6).unwrap();
        device.arm().unwrap();
        device.transport_mut().queue_response([0, 0, 0, 0]);
        assert_eq!(device.poll().unwrap(), None);
        let before = device.settings().clone();
        device.reset();
        assert_eq!(device.phase(), Phase::Idle);
        assert_eq!(device.settings(), &before);
        assert_eq!(device.poll().unwrap(), None);
    }

    #[test]
    fn test_software_trigger_capture() {
        let mut device = Device::new(Model::Dso6022be, RecordingTransport::new());
        device.set_channel_used(1, true).unwrap();
        device.set_gain(0, 1.0).unwrap();
        device.set_pretrigger_position(0.5).unwrap();
        device.arm().unwrap();
        let frames = 10240 + 2000;
        let mut raw = Vec::with_capacity(frames * 2);
        for frame in 0..frames {
            let value = if frame < 6000 { 0x40 } else { 0xc0 };
            raw.extend_from_slice(&[0x80, value]); // channel 2 flat, channel 1 steps up
        }
        device.transport_mut().queue_response(raw);
        let data = device.poll().unwrap().unwrap();
        match data.trigger {
            Some(search @ crate::trigger::TriggerSearch::Found(found)) => {
                assert_eq!(found.index, 6000);
                assert_eq!(search.window(frames, 10240), 880..11120);
            }
            other => panic!("{:?}", other),
        }
        let sent = device.transport().sent();
        assert_eq!(sent.last(), Some(&Transfer::Control(ControlCode::AcquireHardData, vec![1])));
    }
}
