//! Compiler configuration
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (busgen.toml)
//! - Environment variables (BUSGEN__*)
//!
//! ## Example config file (busgen.toml):
//! ```toml
//! [input]
//! messages = "schemas/bus_object_schema.yaml"
//! enums = "schemas/enumerates_schema.yaml"
//! structs = "schemas/structs_schema.yaml"
//!
//! [output]
//! root = "generated"
//!
//! [model]
//! root_message = "BusObject"
//! root_struct = "BusObjectStruct"
//!
//! [crc]
//! polynomial = "0x1F1922815"
//! ```
//!
//! The loaded value is passed explicitly to every compiler phase.

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main compiler configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Schema document locations
    #[serde(default)]
    pub input: InputConfig,

    /// Output directories
    #[serde(default)]
    pub output: OutputConfig,

    /// Generated file-identifier layout
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Names the model treats specially
    #[serde(default)]
    pub model: ModelConfig,

    /// Checksum settings
    #[serde(default)]
    pub crc: CrcConfig,
}

/// Schema document locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_messages_input")]
    pub messages: PathBuf,

    #[serde(default = "default_enums_input")]
    pub enums: PathBuf,

    #[serde(default = "default_structs_input")]
    pub structs: PathBuf,
}

/// Output directories; everything but `root` is relative to `root`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_root")]
    pub root: PathBuf,

    #[serde(default = "default_manifest_dir")]
    pub manifest: PathBuf,

    #[serde(default = "default_cpp_include_dir")]
    pub cpp_include: PathBuf,

    #[serde(default = "default_cpp_unit_tests_dir")]
    pub cpp_unit_tests: PathBuf,

    #[serde(default = "default_utility_dir")]
    pub utility: PathBuf,

    /// Python `construct` package
    #[serde(default = "default_python_dir")]
    pub python: PathBuf,
}

/// Directories (relative to the include root) that file identifiers live in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_messages_layout")]
    pub messages: String,

    #[serde(default = "default_structs_layout")]
    pub structs: String,

    #[serde(default = "default_enums_layout")]
    pub enums: String,

    #[serde(default = "default_crc_layout")]
    pub crc: String,

    #[serde(default = "default_msg_handling_layout")]
    pub msg_handling: String,

    #[serde(default = "default_utility_layout")]
    pub utility: String,

    #[serde(default = "default_header_extension")]
    pub header_extension: String,
}

/// Names with special meaning in the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// The abstract root every bus message inherits from
    #[serde(default = "default_root_message")]
    pub root_message: String,

    /// The universal root struct
    #[serde(default = "default_root_struct")]
    pub root_struct: String,

    /// Name of the synthesized message-id registry enum
    #[serde(default = "default_message_id_enum")]
    pub message_id_enum: String,

    /// Storage type of the message-id registry
    #[serde(default = "default_message_id_type")]
    pub message_id_type: String,

    /// Appended to a message's file identifier
    #[serde(default = "default_message_file_suffix")]
    pub message_file_suffix: String,
}

/// Checksum settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrcConfig {
    /// Generator polynomial in explicit-top-bit notation
    #[serde(default = "default_polynomial")]
    pub polynomial: String,
}

// Default value functions
fn default_messages_input() -> PathBuf {
    PathBuf::from("src/bus_object_schema.yaml")
}

fn default_enums_input() -> PathBuf {
    PathBuf::from("src/enumerates_schema.yaml")
}

fn default_structs_input() -> PathBuf {
    PathBuf::from("src/structs_schema.yaml")
}

fn default_output_root() -> PathBuf {
    PathBuf::from("generated")
}

fn default_manifest_dir() -> PathBuf {
    PathBuf::from("manifest")
}

fn default_cpp_include_dir() -> PathBuf {
    PathBuf::from("cpp/include")
}

fn default_cpp_unit_tests_dir() -> PathBuf {
    PathBuf::from("cpp/unit_tests")
}

fn default_utility_dir() -> PathBuf {
    PathBuf::from("utility")
}

fn default_python_dir() -> PathBuf {
    PathBuf::from("py/common_msg")
}

fn default_messages_layout() -> String {
    "common_msg/".to_string()
}

fn default_structs_layout() -> String {
    "common_msg/structs/".to_string()
}

fn default_enums_layout() -> String {
    "common_msg/enums/".to_string()
}

fn default_crc_layout() -> String {
    "common_msg/crc/".to_string()
}

fn default_msg_handling_layout() -> String {
    "common_msg/msg_handling/".to_string()
}

fn default_utility_layout() -> String {
    "common_msg/utility/".to_string()
}

fn default_header_extension() -> String {
    ".h".to_string()
}

fn default_root_message() -> String {
    "BusObject".to_string()
}

fn default_root_struct() -> String {
    "BusObjectStruct".to_string()
}

fn default_message_id_enum() -> String {
    "MessageId".to_string()
}

fn default_message_id_type() -> String {
    "uint16_t".to_string()
}

fn default_message_file_suffix() -> String {
    "_message".to_string()
}

fn default_polynomial() -> String {
    "0x1F1922815".to_string()
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            messages: default_messages_input(),
            enums: default_enums_input(),
            structs: default_structs_input(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: default_output_root(),
            manifest: default_manifest_dir(),
            cpp_include: default_cpp_include_dir(),
            cpp_unit_tests: default_cpp_unit_tests_dir(),
            utility: default_utility_dir(),
            python: default_python_dir(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            messages: default_messages_layout(),
            structs: default_structs_layout(),
            enums: default_enums_layout(),
            crc: default_crc_layout(),
            msg_handling: default_msg_handling_layout(),
            utility: default_utility_layout(),
            header_extension: default_header_extension(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            root_message: default_root_message(),
            root_struct: default_root_struct(),
            message_id_enum: default_message_id_enum(),
            message_id_type: default_message_id_type(),
            message_file_suffix: default_message_file_suffix(),
        }
    }
}

impl Default for CrcConfig {
    fn default() -> Self {
        Self {
            polynomial: default_polynomial(),
        }
    }
}

impl CompilerConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["busgen.toml", ".busgen.toml", "config/busgen.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "busgen", "busgen") {
            let xdg_config = config_dir.config_dir().join("busgen.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (BUSGEN__*)
        builder = builder.add_source(
            Environment::with_prefix("BUSGEN")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Point all three schema documents at `dir`, keeping their file names
    pub fn with_input_dir(mut self, dir: &Path) -> Self {
        for path in [
            &mut self.input.messages,
            &mut self.input.enums,
            &mut self.input.structs,
        ] {
            if let Some(file) = path.file_name().map(|f| f.to_os_string()) {
                *path = dir.join(file);
            }
        }
        self
    }

    pub fn with_output_root(mut self, root: &Path) -> Self {
        self.output.root = root.to_path_buf();
        self
    }

    pub fn manifest_dir(&self) -> PathBuf {
        self.output.root.join(&self.output.manifest)
    }

    pub fn cpp_include_dir(&self) -> PathBuf {
        self.output.root.join(&self.output.cpp_include)
    }

    pub fn cpp_unit_tests_dir(&self) -> PathBuf {
        self.output.root.join(&self.output.cpp_unit_tests)
    }

    pub fn utility_dir(&self) -> PathBuf {
        self.output.root.join(&self.output.utility)
    }

    pub fn python_dir(&self) -> PathBuf {
        self.output.root.join(&self.output.python)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert_eq!(config.model.root_message, "BusObject");
        assert_eq!(config.layout.header_extension, ".h");
        assert_eq!(config.manifest_dir(), PathBuf::from("generated/manifest"));
    }

    #[test]
    fn test_serialize_config() {
        let config = CompilerConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[input]"));
        assert!(toml_str.contains("[model]"));

        let parsed: CompilerConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: CompilerConfig = toml::from_str("[model]\nroot_message = \"Root\"\n").unwrap();
        assert_eq!(parsed.model.root_message, "Root");
        assert_eq!(parsed.model.root_struct, "BusObjectStruct");
        assert_eq!(parsed.crc.polynomial, "0x1F1922815");
    }

    #[test]
    fn test_with_input_dir() {
        let config = CompilerConfig::default().with_input_dir(Path::new("schemas"));
        assert_eq!(config.input.enums, PathBuf::from("schemas/enumerates_schema.yaml"));
    }

    #[test]
    fn test_output_dirs_follow_root() {
        let config = CompilerConfig::default().with_output_root(Path::new("out"));
        assert_eq!(config.python_dir(), PathBuf::from("out/py/common_msg"));
        assert_eq!(config.utility_dir(), PathBuf::from("out/utility"));
    }
}
