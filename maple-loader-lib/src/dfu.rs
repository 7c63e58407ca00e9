//! dfu-util command lines and `dfu-util -l` parsing.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use strum::EnumString;

pub const DFU_UTIL: &str = "dfu-util";

/// Firmware image formats, keyed by file extension.
#[derive(Debug, Clone, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ImageType {
    Bin,
    Hex,
    Elf,
    #[strum(default)]
    Other(String),
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageType::Bin => f.write_str("bin"),
            ImageType::Hex => f.write_str("hex"),
            ImageType::Elf => f.write_str("elf"),
            ImageType::Other(ext) if ext.is_empty() => f.write_str("<none>"),
            ImageType::Other(ext) => f.write_str(ext),
        }
    }
}

impl ImageType {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let ext = path
            .as_ref()
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default();
        // `default` variant makes parsing infallible.
        ImageType::from_str(&ext).unwrap_or(ImageType::Other(ext))
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, ImageType::Bin)
    }
}

/// Output of one `dfu-util -l` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceListing {
    pub text: String,
    pub found: bool,
}

impl DeviceListing {
    pub fn new(text: String, usb_id: &str) -> Self {
        let found = device_found(&text, usb_id);
        Self { text, found }
    }
}

/// Matches the `Found DFU: [...]` line of both old (`0x1eaf`) and new
/// (`1eaf`) dfu-util releases against the vendor part of `usb_id`.
pub fn device_found(listing: &str, usb_id: &str) -> bool {
    let vendor = usb_id.get(..4).unwrap_or(usb_id).to_uppercase();
    let listing = listing.to_uppercase();
    listing.contains(&format!("FOUND DFU: [0X{vendor}"))
        || listing.contains(&format!("FOUND DFU: [{vendor}"))
}

pub fn list_args() -> Vec<String> {
    vec![DFU_UTIL.to_string(), "-l".to_string()]
}

/// `dfu-util -a <alt> -R -d <usb id> -D <image>`
pub fn download_args(alt_id: &str, usb_id: &str, image: &Path) -> Vec<String> {
    vec![
        DFU_UTIL.to_string(),
        "-a".to_string(),
        alt_id.to_string(),
        "-R".to_string(),
        "-d".to_string(),
        usb_id.to_string(),
        "-D".to_string(),
        image.to_string_lossy().into_owned(),
    ]
}
