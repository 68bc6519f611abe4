//! Supported oscilloscope models.
//!
//! Models differ only in data: each one is a factory building its [`ModelSpec`] and a list of
//! encoders that replace the defaults in the [`CommandRegistry`].
//!
//! | Model      | Channels | Normal max | Fast max | Sample bits | Protocol     |
//! |------------|----------|------------|----------|-------------|--------------|
//! | DSO-2090   | 2        | 50 MS/s    | 100 MS/s | 8           | bulk         |
//! | DSO-2150   | 2        | 75 MS/s    | 150 MS/s | 8           | bulk         |
//! | DSO-2250   | 2        | 100 MS/s   | 250 MS/s | 8           | bulk         |
//! | DSO-5200   | 2        | 125 MS/s   | 250 MS/s | 10          | bulk         |
//! | DSO-5200A  | 2        | 125 MS/s   | 250 MS/s | 10          | bulk         |
//! | DSO-6022BE | 2        | 48 MS/s    |          | 8           | control only |

mod dso2090;
mod dso2250;
mod dso5200;
mod dso6022;

use crate::commands::{Command, CommandRegistry};
use crate::spec::{GainLevel, ModelSpec, SpecialTriggerChannel};

const VENDOR_HANTEK: u16 = 0x04b5;
const VENDOR_CYPRESS: u16 = 0x04b4;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Model {
    Dso2090,
    Dso2150,
    Dso2250,
    Dso5200,
    Dso5200A,
    Dso6022be,
}

impl Model {
    pub const ALL: [Model; 6] = [
        Model::Dso2090,
        Model::Dso2150,
        Model::Dso2250,
        Model::Dso5200,
        Model::Dso5200A,
        Model::Dso6022be,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Model::Dso2090 => "DSO-2090",
            Model::Dso2150 => "DSO-2150",
            Model::Dso2250 => "DSO-2250",
            Model::Dso5200 => "DSO-5200",
            Model::Dso5200A => "DSO-5200A",
            Model::Dso6022be => "DSO-6022BE",
        }
    }

    /// USB vendor and product id of the model, after its firmware is loaded.
    pub fn usb_id(self) -> (u16, u16) {
        match self {
            Model::Dso2090 => (VENDOR_HANTEK, 0x2090),
            Model::Dso2150 => (VENDOR_HANTEK, 0x2150),
            Model::Dso2250 => (VENDOR_HANTEK, 0x2250),
            Model::Dso5200 => (VENDOR_HANTEK, 0x5200),
            Model::Dso5200A => (VENDOR_HANTEK, 0x520a),
            Model::Dso6022be => (VENDOR_CYPRESS, 0x6022),
        }
    }

    pub fn from_usb_id(vendor: u16, product: u16) -> Option<Model> {
        let model = Model::ALL.into_iter().find(|model| model.usb_id() == (vendor, product));
        log::debug!("from_usb_id({:04x}:{:04x}) = {:?}", vendor, product, model);
        model
    }

    pub fn spec(self) -> ModelSpec {
        match self {
            Model::Dso2090 => dso2090::dso2090(),
            Model::Dso2150 => dso2090::dso2150(),
            Model::Dso2250 => dso2250::dso2250(),
            Model::Dso5200 => dso5200::dso5200(),
            Model::Dso5200A => dso5200::dso5200a(),
            Model::Dso6022be => dso6022::dso6022be(),
        }
    }

    /// Install the encoders this model needs on top of [`CommandRegistry::defaults`].
    pub fn apply_requirements(self, registry: &mut CommandRegistry) {
        let commands: &[Command] = match self {
            Model::Dso2090 | Model::Dso2150 => &[],
            Model::Dso2250 => dso2250::COMMANDS,
            Model::Dso5200 | Model::Dso5200A => dso5200::COMMANDS,
            Model::Dso6022be => dso6022::COMMANDS,
        };
        for &command in commands {
            registry.register(command);
        }
    }
}

/// The nine V/div steps every model offers, paired with the model's hardware gain ids.
fn gain_table(hardware_ids: [u8; 9]) -> Vec<GainLevel> {
    const VOLTS_PER_DIV: [f64; 9] = [0.01, 0.02, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0];
    hardware_ids.into_iter()
        .zip(VOLTS_PER_DIV)
        .map(|(hardware_id, gain)| GainLevel { hardware_id, gain })
        .collect()
}

fn external_triggers(names: &[(&'static str, i32)]) -> Vec<SpecialTriggerChannel> {
    names.iter()
        .map(|&(name, hardware_id)| SpecialTriggerChannel { name, hardware_id })
        .collect()
}
