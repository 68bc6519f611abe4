//! Wire-level codes and packed bit fields of the Hantek USB protocol.

use bitflags::bitflags;

/// Bulk command opcodes, sent as the first byte of every bulk OUT transfer.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BulkCode {
    SetFilter                = 0x00,
    SetTriggerAndSamplerate  = 0x01,
    ForceTrigger             = 0x02,
    StartSampling            = 0x03,
    EnableTrigger            = 0x04,
    GetData                  = 0x05,
    GetCaptureState          = 0x06,
    SetGain                  = 0x07,
    SetLogicalData           = 0x08,
    GetLogicalData           = 0x09,
    AUnknown                 = 0x0a,
    BSetChannels             = 0x0b,
    CSetTriggerOrSamplerate  = 0x0c,
    DSetBuffer               = 0x0d,
    ESetTriggerOrSamplerate  = 0x0e,
    FSetBuffer               = 0x0f,
    Invalid                  = 0xff,
}

/// Control (vendor request) codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControlCode {
    Value           = 0xa2,
    GetSpeed        = 0xb2,
    BeginCommand    = 0xb3,
    SetOffset       = 0xb4,
    SetRelays       = 0xb5,
    SetVoltDivCh2   = 0xe0,
    SetVoltDivCh1   = 0xe1,
    SetTimeDiv      = 0xe2,
    AcquireHardData = 0xe3,
}

/// Key of the command registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Bulk(BulkCode),
    Control(ControlCode),
}

impl From<BulkCode> for Opcode {
    fn from(code: BulkCode) -> Self {
        Opcode::Bulk(code)
    }
}

impl From<ControlCode> for Opcode {
    fn from(code: ControlCode) -> Self {
        Opcode::Control(code)
    }
}

/// First byte of the GetCaptureState response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Waiting,
    Sampling,
    Ready,
    Ready2250,
    Ready5200,
}

impl CaptureState {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Waiting),
            1 => Some(Self::Sampling),
            2 => Some(Self::Ready),
            3 => Some(Self::Ready2250),
            7 => Some(Self::Ready5200),
            _ => None,
        }
    }

    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready | Self::Ready2250 | Self::Ready5200)
    }
}

/// Value of the "used channels" field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UsedChannels {
    Ch1     = 0x00,
    Ch2     = 0x01,
    Ch1Ch2  = 0x02,
    /// Channel 2 alone, as the DSO-2250 encodes it.
    BCh2    = 0x03,
}

impl UsedChannels {
    /// Both channels off is sent as `Ch1`; the device always samples something.
    pub fn from_used(ch1: bool, ch2: bool, b_encoding: bool) -> Self {
        match (ch1, ch2) {
            (true, true) => Self::Ch1Ch2,
            (false, true) if b_encoding => Self::BCh2,
            (false, true) => Self::Ch2,
            _ => Self::Ch1,
        }
    }
}

bitflags! {
    /// Byte 2 of SetTriggerAndSamplerate:
    /// `trigger_source:2 | record_length:3 | samplerate_id:2 | downsampling:1`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Tsr1Bits: u8 {
        const Downsampling = 1<<7;
    }
}

impl Tsr1Bits {
    pub fn new(trigger_source: u8, record_length: u8, samplerate_id: u8, downsampling: bool) -> Self {
        let mut bits = Self::from_bits_retain(
            (trigger_source & 0b11) << 0 |
            (record_length & 0b111) << 2 |
            (samplerate_id & 0b11) << 5
        );
        bits.set(Self::Downsampling, downsampling);
        bits
    }

    #[cfg(test)]
    pub fn trigger_source(self) -> u8 {
        (self.bits() >> 0) & 0b11
    }

    #[cfg(test)]
    pub fn record_length(self) -> u8 {
        (self.bits() >> 2) & 0b111
    }

    #[cfg(test)]
    pub fn samplerate_id(self) -> u8 {
        (self.bits() >> 5) & 0b11
    }
}

bitflags! {
    /// Byte 3 of SetTriggerAndSamplerate: `used_channels:2 | fast_rate:1 | trigger_slope:1`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Tsr2Bits: u8 {
        const FastRate      = 1<<2;
        const SlopeNegative = 1<<3;
    }
}

impl Tsr2Bits {
    pub fn new(used_channels: UsedChannels, fast_rate: bool, slope_negative: bool) -> Self {
        let mut bits = Self::from_bits_retain(used_channels as u8 & 0b11);
        bits.set(Self::FastRate, fast_rate);
        bits.set(Self::SlopeNegative, slope_negative);
        bits
    }

    #[cfg(test)]
    pub fn used_channels(self) -> u8 {
        self.bits() & 0b11
    }
}

bitflags! {
    /// Byte 2 of the DSO-2250 CSetTriggerOrSamplerate: `trigger_source:2 | trigger_slope:1`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CTriggerBits: u8 {
        const SlopeNegative = 1<<2;
    }
}

impl CTriggerBits {
    pub fn new(trigger_source: u8, slope_negative: bool) -> Self {
        let mut bits = Self::from_bits_retain(trigger_source & 0b11);
        bits.set(Self::SlopeNegative, slope_negative);
        bits
    }
}

bitflags! {
    /// Byte 2 of the DSO-2250 ESetTriggerOrSamplerate: `fast_rate:1 | downsampling:1`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ESamplerateBits: u8 {
        const FastRate     = 1<<0;
        const Downsampling = 1<<1;
    }
}

bitflags! {
    /// Byte 2 of the DSO-5200 ESetTriggerOrSamplerate:
    /// `fast_rate:1 | used_channels:2 | trigger_source:2 | trigger_slope:1 | trigger_pulse:1`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ETsrBits: u8 {
        const FastRate      = 1<<0;
        const SlopeNegative = 1<<5;
        const TriggerPulse  = 1<<6;
    }
}

impl ETsrBits {
    pub fn new(fast_rate: bool, used_channels: UsedChannels, trigger_source: u8,
               slope_negative: bool) -> Self {
        let mut bits = Self::from_bits_retain(
            (used_channels as u8 & 0b11) << 1 |
            (trigger_source & 0b11) << 3
        );
        bits.set(Self::FastRate, fast_rate);
        bits.set(Self::SlopeNegative, slope_negative);
        bits
    }
}

bitflags! {
    /// Byte 2 of SetGain: two bits of gain id per channel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GainBits: u8 {
        const _ = !0;
    }
}

impl GainBits {
    pub fn with_channel(self, channel: usize, gain_id: u8) -> Self {
        let shift = 2 * channel as u32;
        let cleared = self.bits() & !(0b11u8.wrapping_shl(shift));
        Self::from_bits_retain(cleared | (gain_id & 0b11).wrapping_shl(shift))
    }

    #[cfg(test)]
    pub fn channel(self, channel: usize) -> u8 {
        self.bits().wrapping_shr(2 * channel as u32) & 0b11
    }
}

/// Trigger source code of the external inputs in the DSO-2090 and DSO-5200 records.
pub const TRIGGER_SOURCE_SPECIAL: u8 = 3;

/// Trigger position value meaning "start of the buffer" for pretrigger encodings.
pub const TRIGGER_POSITION_MAX: u32 = 0x7ffff;

/// The trigger point in the capture state response is gray coded; each set bit inverts all
/// bits of lower value.
pub fn decode_trigger_point(value: u32) -> u32 {
    let mut result = value;
    for shift in 0..32 {
        let bit = 1u32 << shift;
        if result & bit != 0 {
            result ^= bit - 1;
        }
    }
    result
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tsr1_fields() {
        let bits = Tsr1Bits::new(2, 0b101, 0b11, true);
        assert_eq!(bits.bits(), 0b1_11_101_10);
        assert_eq!(bits.trigger_source(), 2);
        assert_eq!(bits.record_length(), 0b101);
        assert_eq!(bits.samplerate_id(), 0b11);
        assert!(bits.contains(Tsr1Bits::Downsampling));
    }

    #[test]
    fn test_tsr2_fields() {
        let bits = Tsr2Bits::new(UsedChannels::Ch1Ch2, true, false);
        assert_eq!(bits.bits(), 0b0110);
        assert_eq!(bits.used_channels(), 2);
    }

    #[test]
    fn test_gain_bits() {
        let bits = GainBits::empty().with_channel(0, 2).with_channel(1, 3);
        assert_eq!(bits.bits(), 0b1110);
        assert_eq!(bits.with_channel(0, 1).bits(), 0b1101);
        assert_eq!(bits.channel(1), 3);
    }

    #[test]
    fn test_used_channels() {
        assert_eq!(UsedChannels::from_used(true, false, false), UsedChannels::Ch1);
        assert_eq!(UsedChannels::from_used(false, true, false), UsedChannels::Ch2);
        assert_eq!(UsedChannels::from_used(false, true, true), UsedChannels::BCh2);
        assert_eq!(UsedChannels::from_used(true, true, true), UsedChannels::Ch1Ch2);
        assert_eq!(UsedChannels::from_used(false, false, true), UsedChannels::Ch1);
    }

    #[test]
    fn test_capture_state() {
        assert_eq!(CaptureState::from_code(3), Some(CaptureState::Ready2250));
        assert!(CaptureState::Ready5200.is_ready());
        assert!(!CaptureState::Sampling.is_ready());
        assert_eq!(CaptureState::from_code(4), None);
    }

    #[test]
    fn test_gray_trigger_point() {
        assert_eq!(decode_trigger_point(0), 0);
        assert_eq!(decode_trigger_point(0b1), 0b1);
        assert_eq!(decode_trigger_point(0b11), 0b10);
        assert_eq!(decode_trigger_point(0b10), 0b11);
        assert_eq!(decode_trigger_point(0b110), 0b100);
        for n in 0u32..1024 {
            assert_eq!(decode_trigger_point(n ^ (n >> 1)), n);
        }
    }
}
