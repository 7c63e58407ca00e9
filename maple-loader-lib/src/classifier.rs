//! Classification of dfu-util output lines.

/// What to do with a single line of tool output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    /// Banner or licence noise.
    Ignore,
    /// A fatal condition, carrying the message shown to the user.
    Error(String),
    /// Anything else; echoed as-is.
    Info,
}

impl LineClass {
    pub fn is_error(&self) -> bool {
        matches!(self, LineClass::Error(_))
    }
}

const BANNERS: &[&str] = &[
    "dfu-util - (C) ",
    "This program is Free Software and has ABSOLUTELY NO WARRANTY",
];

const NO_DEVICE: &str = "No DFU capable USB device found";

// Older uploaders matched a misspelt form; accept both.
const NOT_PERMITTED: &[&str] = &["Operation not permitted", "Operation not perimitted"];

pub const NO_DEVICE_MESSAGE: &str = "Problem uploading via dfu-util: No Maple found";
pub const NOT_PERMITTED_MESSAGE: &str = "Problem uploading via dfu-util: Insufficient privileges";

pub struct OutputClassifier;

impl OutputClassifier {
    /// Rules are checked in order; the first match wins.
    pub fn classify(line: &str) -> LineClass {
        if BANNERS.iter().any(|banner| line.contains(banner)) {
            return LineClass::Ignore;
        }
        if line.contains(NO_DEVICE) {
            return LineClass::Error(NO_DEVICE_MESSAGE.to_string());
        }
        if NOT_PERMITTED.iter().any(|text| line.contains(text)) {
            return LineClass::Error(NOT_PERMITTED_MESSAGE.to_string());
        }
        LineClass::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_wins_over_error_text() {
        let line = "dfu-util - (C) 2011 No DFU capable USB device found";
        assert_eq!(OutputClassifier::classify(line), LineClass::Ignore);
    }

    #[test]
    fn misspelt_permission_error_is_recognised() {
        assert!(OutputClassifier::classify("libusb: Operation not perimitted").is_error());
    }
}
