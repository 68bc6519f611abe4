mod limits;
mod protocol;
mod spec;
mod settings;
mod calibration;
mod resolver;
mod commands;
mod models;
mod trigger;
mod capture;
mod transport;
mod device;

#[derive(Debug)]
pub enum Error {
    Busy,
    UnsupportedCommand(Opcode),
    InvalidResponse(&'static str),
    Transport(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Busy =>
                write!(f, "capture in progress"),
            Self::UnsupportedCommand(opcode) =>
                write!(f, "no command registered for {:?}", opcode),
            Self::InvalidResponse(what) =>
                write!(f, "invalid response: {}", what),
            Self::Transport(io_error) =>
                write!(f, "transport error: {}", io_error),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            &Self::Transport(ref io_error) => Some(io_error),
            _ => None
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        match error.downcast::<Self>() {
            Ok(error) => error,
            Err(error) => Error::Transport(error),
        }
    }
}

pub type Result<T> =
    core::result::Result<T, Error>;

pub use limits::{
    RecordLengthKind,
    RecordLength,
    SamplerateLimits,
};

pub use protocol::{
    BulkCode,
    ControlCode,
    Opcode,
    CaptureState,
    UsedChannels,
};

pub use spec::{
    Coupling,
    TriggerMode,
    Slope,
    Features,
    DownsamplerRule,
    LimitsId,
    CommandCodes,
    GainLevel,
    FixedSampleRate,
    GainStepCalibration,
    SpecialTriggerChannel,
    ModelSpec,
};

pub use settings::{
    MathMode,
    ChannelMode,
    TargetSelector,
    SamplerateTarget,
    SamplerateSettings,
    TriggerSettings,
    VoltageSettings,
    ControlSettings,
};

pub use calibration::{
    ResolvedOffset,
    RelayState,
    SampleScale,
};

pub use resolver::{
    SamplerateResolution,
};

pub use commands::{
    Command,
    CommandRegistry,
};

pub use models::Model;

pub use trigger::{
    EdgeFilter,
    Edge,
    Trigger,
    TriggerSamples,
    TriggerSearch,
    SoftwareTrigger,
};

pub use capture::{
    CaptureStatus,
    CaptureData,
    receive_length,
};

pub use transport::{
    Transport,
    Transfer,
    RecordingTransport,
};

pub use device::{
    Phase,
    Device,
};
