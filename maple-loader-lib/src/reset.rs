use crate::Result;
use crate::progress::ProgressHelper;
use serialport::{DataBits, Parity, SerialPort, StopBits};
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Magic token that makes newer Maple bootloaders jump into DFU.
pub const MAGIC_RESET_TOKEN: &[u8; 4] = b"1EAF";

/// The serial operations the reset pulse needs.
pub trait ControlLines {
    /// RTS (control line A).
    fn set_rts(&mut self, level: bool) -> Result<()>;
    /// DTR (control line B).
    fn set_dtr(&mut self, level: bool) -> Result<()>;
    fn write_bytes(&mut self, data: &[u8]) -> Result<()>;
}

impl ControlLines for Box<dyn SerialPort> {
    fn set_rts(&mut self, level: bool) -> Result<()> {
        self.write_request_to_send(level)?;
        Ok(())
    }

    fn set_dtr(&mut self, level: bool) -> Result<()> {
        self.write_data_terminal_ready(level)?;
        Ok(())
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.write_all(data)?;
        self.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub baud: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud: 9600,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

impl SerialSettings {
    /// Builds settings from the textual preference values (`"N"`, `8`, `1`, ...).
    pub fn from_preferences(baud: u32, parity: &str, data_bits: u8, stop_bits: u8) -> Result<Self> {
        let parity = match parity.trim().to_ascii_uppercase().as_str() {
            "N" | "NONE" => Parity::None,
            "E" | "EVEN" => Parity::Even,
            "O" | "ODD" => Parity::Odd,
            other => return Err(crate::Error::invalid_input(format!("parity `{other}`"))),
        };
        let data_bits = match data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            8 => DataBits::Eight,
            other => return Err(crate::Error::invalid_input(format!("data bits `{other}`"))),
        };
        let stop_bits = match stop_bits {
            1 => StopBits::One,
            2 => StopBits::Two,
            other => return Err(crate::Error::invalid_input(format!("stop bits `{other}`"))),
        };
        Ok(Self {
            baud,
            data_bits,
            parity,
            stop_bits,
        })
    }
}

/// Forces a Maple board into its bootloader through the serial control lines.
pub struct DeviceResetter {
    settings: SerialSettings,
    progress: ProgressHelper,
}

impl DeviceResetter {
    pub fn new(settings: SerialSettings, progress: ProgressHelper) -> Self {
        Self { settings, progress }
    }

    /// Best effort: returns `false` after warning if the port could not be driven.
    pub fn pulse(&self, port_name: &str, delay: Duration) -> bool {
        let spinner = self
            .progress
            .create_spinner("Resetting to bootloader via DTR pulse");
        match self.try_pulse(port_name, delay) {
            Ok(()) => {
                info!("reset pulse sent on {}", port_name);
                spinner.finish_with_message("Reset pulse sent");
                true
            }
            Err(e) => {
                warn!("serial reset on {} failed: {}", port_name, e);
                spinner.finish_with_message("Reset via USB Serial failed");
                self.progress.warn(
                    "Reset via USB Serial failed! Did you select the right serial port?\n\
                     Assuming the board is in perpetual bootloader mode and continuing to attempt dfu programming...",
                );
                false
            }
        }
    }

    fn try_pulse(&self, port_name: &str, delay: Duration) -> Result<()> {
        let mut port = serialport::new(port_name, self.settings.baud)
            .data_bits(self.settings.data_bits)
            .parity(self.settings.parity)
            .stop_bits(self.settings.stop_bits)
            .timeout(Duration::from_secs(1))
            .open()?;
        let result = pulse_lines(&mut port, delay);
        // Dropping the handle closes the port before the search starts.
        drop(port);
        result
    }
}

/// Runs the reset sequence on an already opened port.
///
/// A falling DTR edge resets older boards; RTS high plus the `1EAF` token
/// covers the newer bootloader.
pub fn pulse_lines<P: ControlLines + ?Sized>(port: &mut P, delay: Duration) -> Result<()> {
    port.set_rts(false)?;
    port.set_dtr(false)?;

    port.set_dtr(true)?;
    std::thread::sleep(delay);
    port.set_dtr(false)?;

    port.set_rts(true)?;
    port.set_dtr(true)?;
    std::thread::sleep(delay);
    port.set_dtr(false)?;
    std::thread::sleep(delay);

    debug!("writing magic reset token");
    port.write_bytes(MAGIC_RESET_TOKEN)?;
    std::thread::sleep(delay);
    Ok(())
}
