//! Common types for remote attribute access

use std::fmt;

/// What kind of remote attribute an accessor targets
///
/// Reads and writes behave identically for both; the kind only shows up in
/// gate labels and log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    /// Characteristic descriptor
    Descriptor,
    /// Characteristic value
    Characteristic,
}

impl AttributeKind {
    pub(crate) fn read_label(&self) -> &'static str {
        match self {
            AttributeKind::Descriptor => "ReadDescriptor",
            AttributeKind::Characteristic => "ReadCharacteristic",
        }
    }

    pub(crate) fn write_label(&self) -> &'static str {
        match self {
            AttributeKind::Descriptor => "WriteDescriptor",
            AttributeKind::Characteristic => "WriteCharacteristic",
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeKind::Descriptor => write!(f, "Descriptor"),
            AttributeKind::Characteristic => write!(f, "Characteristic"),
        }
    }
}

/// Remote accessor configuration
#[derive(Debug, Clone)]
pub struct AccessorConfig {
    /// Retries allowed after the first attempt of a call
    pub security_retries: u8,
    /// Retry a refused long write as a truncated single-frame write
    pub truncate_on_not_long: bool,
}

impl AccessorConfig {
    /// Hard ceiling on attempts per call
    pub fn max_attempts(&self) -> u8 {
        self.security_retries.saturating_add(1)
    }
}

impl Default for AccessorConfig {
    fn default() -> Self {
        Self {
            security_retries: 1,
            truncate_on_not_long: true,
        }
    }
}
