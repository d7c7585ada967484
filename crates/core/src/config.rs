//! JSON machine description: register preset, memory size and load address

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cpu_8086::{CpuOption, MemoryError, SegmentedMemory, MAX_MEMORY_SIZE};
use crate::logging::{GlobalLogger, LogCategory};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// Register layout applied before any explicit override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// CS=DS=ES=0x1000, SS=0x2000, SP=0xFFFE, IP=0x0100, IF set
    #[default]
    Dos,
    /// CS=0xF000, SP=0x0400, IP=0xFFF0, IF clear
    Bios,
    /// Power-on state (CS=0xFFFF, IP=0)
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineConfig {
    #[serde(default)]
    pub preset: Preset,
    #[serde(default = "default_memory_size")]
    pub memory_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cs: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ds: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub es: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ss: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sp: Option<u16>,
    /// Segment the program image is copied to; defaults to the final CS
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_segment: Option<u16>,
    /// Offset the program image is copied to; defaults to the final IP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_offset: Option<u16>,
    /// Level name understood by `LogLevel::from_str`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(default)]
    pub trace: bool,
}

fn default_memory_size() -> usize {
    MAX_MEMORY_SIZE
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            preset: Preset::default(),
            memory_size: default_memory_size(),
            cs: None,
            ds: None,
            es: None,
            ss: None,
            ip: None,
            sp: None,
            load_segment: None,
            load_offset: None,
            log_level: None,
            trace: false,
        }
    }
}

impl MachineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// CPU options in application order: preset, then overrides, then memory size
    pub fn options(&self) -> Vec<CpuOption> {
        let mut options = Vec::new();
        match self.preset {
            Preset::Dos => options.push(CpuOption::DosDefaults),
            Preset::Bios => options.push(CpuOption::BiosDefaults),
            Preset::None => {}
        }
        let overrides = [
            self.cs.map(CpuOption::Cs),
            self.ds.map(CpuOption::Ds),
            self.es.map(CpuOption::Es),
            self.ss.map(CpuOption::Ss),
            self.ip.map(CpuOption::Ip),
            self.sp.map(CpuOption::Sp),
        ];
        options.extend(overrides.into_iter().flatten());
        options.push(CpuOption::MemorySize(self.memory_size));
        options
    }

    /// Memory of the configured size, reporting through the `Memory` log category
    pub fn build_memory(&self) -> Result<SegmentedMemory, ConfigError> {
        let logger = Arc::new(GlobalLogger::new(LogCategory::Memory));
        Ok(SegmentedMemory::new(self.memory_size)?.with_logger(logger))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu_8086::{Cpu8086, MemoryError};

    #[test]
    fn test_defaults_from_empty_object() {
        let config = MachineConfig::from_json("{}").unwrap();
        assert_eq!(config, MachineConfig::default());
        assert_eq!(
            config.options(),
            vec![CpuOption::DosDefaults, CpuOption::MemorySize(0x100000)]
        );
    }

    #[test]
    fn test_overrides_follow_preset() {
        let config = MachineConfig::from_json(
            r#"{ "preset": "bios", "memory_size": 65536, "ip": 256, "ss": 8192 }"#,
        )
        .unwrap();
        assert_eq!(
            config.options(),
            vec![
                CpuOption::BiosDefaults,
                CpuOption::Ss(0x2000),
                CpuOption::Ip(0x0100),
                CpuOption::MemorySize(0x10000),
            ]
        );

        let cpu = Cpu8086::with_options(config.build_memory().unwrap(), config.options());
        assert_eq!(cpu.registers().cs(), 0xF000);
        assert_eq!(cpu.registers().ss(), 0x2000);
        assert_eq!(cpu.registers().ip(), 0x0100);
        assert!(!cpu.flags().interrupt_enabled());
    }

    #[test]
    fn test_preset_none() {
        let config = MachineConfig::from_json(r#"{ "preset": "none" }"#).unwrap();
        let cpu = Cpu8086::with_options(config.build_memory().unwrap(), config.options());
        assert_eq!(cpu.registers().cs(), 0xFFFF);
        assert_eq!(cpu.registers().ip(), 0);
    }

    #[test]
    fn test_invalid_json_and_memory_size() {
        assert!(matches!(
            MachineConfig::from_json(r#"{ "preset": "cpm" }"#),
            Err(ConfigError::Json(_))
        ));

        let config = MachineConfig {
            memory_size: 1024,
            ..MachineConfig::default()
        };
        assert!(matches!(
            config.build_memory(),
            Err(ConfigError::Memory(MemoryError::InvalidSize { size: 1024, .. }))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("retro_config_{}.json", std::process::id()));
        let config = MachineConfig {
            preset: Preset::Bios,
            load_segment: Some(0xF000),
            load_offset: Some(0xE000),
            trace: true,
            ..MachineConfig::default()
        };
        config.save(&path).unwrap();
        let loaded = MachineConfig::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }
}
