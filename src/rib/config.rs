//! Encoder configuration, established once per output stream.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::util::{Error, Result};

/// Default number of significant digits for ASCII floats.
pub const DEFAULT_PRECISION: u8 = 6;

/// Wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RibFormat {
    #[default]
    Ascii,
    Binary,
}

/// Stream compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RibCompression {
    #[default]
    None,
    Gzip,
}

/// How non-standard parameter names are declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationMode {
    /// `Declare "name" "class type"` once per stream, plain names afterwards.
    #[default]
    Declare,
    /// `"class type name"` inline at every use.
    Inline,
}

/// Output stream configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub format: RibFormat,
    pub compression: RibCompression,
    /// Significant digits for ASCII floats (1..=17).
    pub precision: u8,
    pub declarations: DeclarationMode,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            format: RibFormat::Ascii,
            compression: RibCompression::None,
            precision: DEFAULT_PRECISION,
            declarations: DeclarationMode::Declare,
        }
    }
}

impl EncoderConfig {
    /// ASCII, uncompressed, default precision.
    pub fn ascii() -> Self {
        Self::default()
    }

    /// Binary, uncompressed.
    pub fn binary() -> Self {
        Self { format: RibFormat::Binary, ..Self::default() }
    }

    /// Set compression.
    pub fn with_compression(mut self, compression: RibCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Set precision, clamped to 1..=17.
    pub fn with_precision(mut self, precision: u8) -> Self {
        self.precision = precision.clamp(1, 17);
        self
    }

    /// Set declaration mode.
    pub fn with_declarations(mut self, mode: DeclarationMode) -> Self {
        self.declarations = mode;
        self
    }

    /// Parse from JSON, clamping precision.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        if config.precision == 0 {
            return Err(Error::InvalidConfig("precision must be at least 1".into()));
        }
        Ok(config.with_precision(config.precision))
    }

    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = EncoderConfig::default();
        assert_eq!(c.format, RibFormat::Ascii);
        assert_eq!(c.compression, RibCompression::None);
        assert_eq!(c.precision, 6);
    }

    #[test]
    fn test_json() -> crate::util::Result<()> {
        let c = EncoderConfig::from_json_str(r#"{ "format": "binary", "compression": "gzip", "precision": 40 }"#)?;
        assert_eq!(c.format, RibFormat::Binary);
        assert_eq!(c.compression, RibCompression::Gzip);
        assert_eq!(c.precision, 17);
        assert!(EncoderConfig::from_json_str(r#"{ "precision": 0 }"#).is_err());
        Ok(())
    }
}
