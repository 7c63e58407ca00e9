//! Uploads firmware to Maple-style STM32 boards through `dfu-util`.
//!
//! An upload resets the board into its bootloader over the serial control
//! lines, waits for it to enumerate as a DFU device and then streams
//! `dfu-util` output through [`classifier::OutputClassifier`] until the tool
//! exits.

pub mod classifier;
pub mod dfu;
pub mod error;
pub mod process;
pub mod progress;
pub mod reset;
pub mod upload;

pub use dfu::{DeviceListing, ImageType};
pub use error::{Error, Result};
pub use reset::SerialSettings;
pub use upload::{UploadConfig, UploadOrchestrator, UploadResult, UploadState};
