//! Reset, search and flash: the upload state machine.

use crate::classifier::{LineClass, OutputClassifier};
use crate::dfu::{self, DFU_UTIL, DeviceListing, ImageType};
use crate::process::{OutputStream, ProcessOutcome, ProcessRunner};
use crate::progress::{ProgressCallbackArc, ProgressHelper};
use crate::reset::{DeviceResetter, SerialSettings};
use crate::{Error, Result};
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use strum::Display;
use tracing::{debug, info};

pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_millis(7000);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_PROGRAM_DELAY: Duration = Duration::from_millis(50);

/// Everything one upload attempt needs, resolved up front.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub port_name: String,
    /// `vendor:product` in hex, e.g. `1EAF:0003`.
    pub usb_id: String,
    pub alt_id: String,
    pub image_path: PathBuf,
    pub image_type: ImageType,
    /// `None` behaves like `Some(true)`.
    pub auto_reset: Option<bool>,
    pub verbose: bool,
    /// Delay between control-line steps of the reset pulse.
    pub program_delay: Duration,
    pub search_timeout: Duration,
    pub poll_interval: Duration,
    /// Directory holding `dfu-util`; empty means look it up on `PATH`.
    pub tool_base_path: PathBuf,
    pub serial: SerialSettings,
}

impl UploadConfig {
    pub fn new(
        port_name: impl Into<String>,
        alt_id: impl Into<String>,
        usb_id: impl Into<String>,
        image_path: impl Into<PathBuf>,
    ) -> Self {
        let image_path = image_path.into();
        Self {
            port_name: port_name.into(),
            usb_id: usb_id.into(),
            alt_id: alt_id.into(),
            image_type: ImageType::from_path(&image_path),
            image_path,
            auto_reset: None,
            verbose: false,
            program_delay: DEFAULT_PROGRAM_DELAY,
            search_timeout: DEFAULT_SEARCH_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            tool_base_path: PathBuf::new(),
            serial: SerialSettings::default(),
        }
    }

    pub fn auto_reset(&self) -> bool {
        self.auto_reset.unwrap_or(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum UploadState {
    Idle,
    Resetting,
    Searching,
    Found,
    TimedOut,
    Flashing,
    Done,
}

/// Terminal outcome of [`UploadOrchestrator::upload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadResult {
    Success,
    DeviceNotFound { usb_id: String, listing: String },
    ToolFailure { exit_code: i32, message: String },
    ToolInvocationError { message: String },
    UnsupportedImageType { image_type: ImageType },
}

impl UploadResult {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadResult::Success)
    }
}

impl fmt::Display for UploadResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadResult::Success => write!(f, "upload succeeded"),
            UploadResult::DeviceNotFound { usb_id, .. } => {
                write!(f, "Couldn't find the DFU device: [{}]", usb_id)
            }
            UploadResult::ToolFailure { message, .. } => f.write_str(message),
            UploadResult::ToolInvocationError { message } => f.write_str(message),
            UploadResult::UnsupportedImageType { image_type } => write!(
                f,
                "Only .bin files are supported at this time (got `{}`)",
                image_type
            ),
        }
    }
}

pub struct UploadOrchestrator {
    progress: ProgressHelper,
}

impl UploadOrchestrator {
    pub fn new(callback: ProgressCallbackArc) -> Self {
        Self {
            progress: ProgressHelper::new(callback, 0),
        }
    }

    pub fn upload(&self, config: UploadConfig) -> UploadResult {
        enter(UploadState::Idle);
        if !config.image_type.is_supported() {
            let result = UploadResult::UnsupportedImageType {
                image_type: config.image_type.clone(),
            };
            return finish(result);
        }

        let runner = ProcessRunner::new(
            config.tool_base_path.clone(),
            config.verbose,
            self.progress.clone(),
        );

        enter(UploadState::Resetting);
        if config.auto_reset() {
            let resetter = DeviceResetter::new(config.serial.clone(), self.progress.clone());
            // The board may already sit in the bootloader, so a failed pulse is not fatal.
            resetter.pulse(&config.port_name, config.program_delay);
        }

        enter(UploadState::Searching);
        let deadline = Instant::now() + config.search_timeout;
        let listing = match self.search(&runner, &config, deadline) {
            Ok(listing) => listing,
            Err(e) => {
                return finish(UploadResult::ToolInvocationError {
                    message: e.to_string(),
                });
            }
        };

        if !listing.found {
            enter(UploadState::TimedOut);
            self.progress.info(listing.text.clone());
            return finish(UploadResult::DeviceNotFound {
                usb_id: config.usb_id.clone(),
                listing: listing.text,
            });
        }
        enter(UploadState::Found);

        enter(UploadState::Flashing);
        finish(self.flash(&runner, &config))
    }

    /// Polls `dfu-util -l` until the device shows up or `deadline` passes.
    ///
    /// The deadline is only checked between polls.
    fn search(
        &self,
        runner: &ProcessRunner,
        config: &UploadConfig,
        deadline: Instant,
    ) -> Result<DeviceListing> {
        let spinner = self
            .progress
            .create_spinner(format!("Searching for DFU device [{}]...", config.usb_id));
        let args = dfu::list_args();
        let mut attempts = 0u32;

        let listing = loop {
            std::thread::sleep(config.poll_interval);
            attempts += 1;
            let outcome = match runner.drain(&args) {
                Ok(outcome) => outcome,
                Err(e) => {
                    spinner.finish_with_message(format!("Failed to run {}", DFU_UTIL));
                    return Err(e);
                }
            };
            if !outcome.success() {
                debug!("{} -l exited with {}", DFU_UTIL, outcome.exit_code);
            }
            let listing = DeviceListing::new(outcome.stdout, &config.usb_id);
            if listing.found || Instant::now() >= deadline {
                break listing;
            }
        };

        debug!("device search finished after {} polls", attempts);
        if listing.found {
            spinner.finish_with_message("Found it!");
        } else {
            spinner.finish_with_message(format!(
                "Couldn't find the DFU device: [{}]",
                config.usb_id
            ));
        }
        Ok(listing)
    }

    fn flash(&self, runner: &ProcessRunner, config: &UploadConfig) -> UploadResult {
        let args = dfu::download_args(&config.alt_id, &config.usb_id, &config.image_path);
        let spinner = self.progress.create_spinner("Uploading via dfu-util");

        // First fatal line wins; later output cannot clear it.
        let first_error: OnceLock<String> = OnceLock::new();
        let progress = &self.progress;
        let consumer = |_source: OutputStream, line: &str| match OutputClassifier::classify(line) {
            LineClass::Ignore => {}
            LineClass::Info => progress.info(line),
            LineClass::Error(message) => {
                progress.error(line);
                let _ = first_error.set(message);
            }
        };

        let streamed = runner.stream(&args, &consumer);
        let first_error = first_error.into_inner();
        if first_error.is_none()
            && let Ok(outcome) = &streamed
            && outcome.exit_code > 1
        {
            self.progress
                .error(format!("{} returned {}", DFU_UTIL, outcome.exit_code));
        }
        let result = flash_result(streamed, first_error);

        spinner.finish_with_message(if result.is_success() {
            "Upload complete"
        } else {
            "Upload failed"
        });
        result
    }
}

/// A classified error line decides the result whenever the tool actually ran,
/// even if its exit code says success or one of its pipes failed afterwards.
fn flash_result(streamed: Result<ProcessOutcome>, first_error: Option<String>) -> UploadResult {
    match (streamed, first_error) {
        (Ok(outcome), Some(message)) => UploadResult::ToolFailure {
            exit_code: outcome.exit_code,
            message,
        },
        (Err(Error::ReaderFailed { exit_code, .. }), Some(message)) => {
            UploadResult::ToolFailure { exit_code, message }
        }
        (Err(e), _) => UploadResult::ToolInvocationError {
            message: e.to_string(),
        },
        (Ok(outcome), None) if outcome.success() => UploadResult::Success,
        (Ok(outcome), None) => UploadResult::ToolFailure {
            exit_code: outcome.exit_code,
            message: format!("exit code: {}", outcome.exit_code),
        },
    }
}

fn enter(state: UploadState) {
    debug!("upload state -> {}", state);
}

fn finish(result: UploadResult) -> UploadResult {
    enter(UploadState::Done);
    info!("upload finished: {}", result);
    result
}
