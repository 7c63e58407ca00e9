use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::config::{Preferences, keys};
use crate::serial::normalize_port_name;

#[derive(Parser, Debug)]
#[command(author, version, about = "Upload a firmware image to a Maple board via dfu-util", long_about = None)]
pub struct Cli {
    /// Serial port used to pulse the board into its bootloader
    pub port: String,

    /// DFU alternate interface (Maple bootloaders: 1 = flash, 0 = RAM)
    pub alt_id: String,

    /// USB id of the bootloader as vendor:product, e.g. 1EAF:0003
    pub usb_id: String,

    /// Firmware image, only .bin files are supported
    pub image: PathBuf,

    /// JSON preference file path
    #[arg(long = "config", short = 'f')]
    pub config: Option<String>,

    /// Print every dfu-util command line before running it
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Do not pulse DTR/RTS before searching for the bootloader
    #[arg(long = "no-auto-reset")]
    pub no_auto_reset: bool,

    /// Delay between reset pulse steps in milliseconds (default: 50)
    #[arg(long = "program-delay")]
    pub program_delay: Option<u32>,

    /// Directory containing dfu-util (default: search PATH)
    #[arg(long = "tool-path")]
    pub tool_path: Option<String>,

    /// Suppress progress output (default: false)
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

/// Load preferences and apply the command line on top of them, CLI args take precedence
pub fn merge_config(args: &Cli) -> Result<Preferences> {
    // 使用配置文件或默认配置
    let mut prefs = match &args.config {
        Some(path) => Preferences::from_file(path)?,
        None => Preferences::with_defaults(),
    };

    prefs.set(keys::SERIAL_PORT, normalize_port_name(&args.port));
    prefs.set(keys::ALT_ID, args.alt_id.trim());
    prefs.set(keys::USB_ID, args.usb_id.trim());

    if args.verbose {
        prefs.set_bool(keys::VERBOSE, true);
    }
    if args.no_auto_reset {
        prefs.set_bool(keys::AUTO_RESET, false);
    }
    if let Some(delay) = args.program_delay {
        prefs.set_int(keys::PROGRAM_DELAY, i64::from(delay));
    }
    if let Some(tool_path) = &args.tool_path {
        prefs.set(keys::TOOL_PATH, tool_path.clone());
    }

    Ok(prefs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_arguments_fill_the_upload_config() {
        let args = Cli::parse_from([
            "maple-loader",
            "/dev/ttyACM0",
            "1",
            "1EAF:0003",
            "blink.bin",
            "--no-auto-reset",
            "--program-delay",
            "10",
        ]);
        let prefs = merge_config(&args).unwrap();
        let config = prefs.to_upload_config(&args.image).unwrap();

        assert_eq!(config.usb_id, "1EAF:0003");
        assert_eq!(config.alt_id, "1");
        assert_eq!(config.auto_reset, Some(false));
        assert_eq!(config.program_delay, std::time::Duration::from_millis(10));
        assert!(config.image_type.is_supported());
    }

    #[test]
    fn four_positionals_are_required() {
        assert!(Cli::try_parse_from(["maple-loader", "/dev/ttyACM0", "1", "1EAF:0003"]).is_err());
    }
}
