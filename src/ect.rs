/*
 * This file is part of Ispcool.
 *
 * Copyright (C) 2025 Ispcool contributors
 *
 * Ispcool is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Ispcool is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Ispcool. If not, see <https://www.gnu.org/licenses/>.
 */

//! Platform thermal configuration (ECT) access.
//!
//! The platform describes per-function throttling as a list of
//! `{lower_bound_temperature, max_frequency}` ranges under a named thermal
//! block. Sources are pluggable at construction time: hosts that ship the
//! block as a file use [`EctFile`], hosts that embed it use [`EctStatic`].

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::table::CoolingError;

/// One temperature range of a thermal function. `max_frequency` is the fps
/// cap that applies from `lower_bound_temperature` upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThermalRange {
    pub lower_bound_temperature: i32,
    pub max_frequency: u32,
}

/// Named throttling profile, e.g. the "ISP" function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermalFunction {
    pub name: String,
    pub range_list: Vec<ThermalRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermalBlock {
    pub functions: Vec<ThermalFunction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EctConfig {
    pub ap_thermal: ThermalBlock,
}

/// Read-only provider of thermal functions.
#[cfg_attr(test, mockall::automock)]
pub trait EctSource {
    /// Look up the named function. Absence of the block or of the function
    /// is `NotFound`.
    fn thermal_function(&self, name: &str) -> Result<ThermalFunction, CoolingError>;
}

fn find_function(
    functions: &[ThermalFunction],
    name: &str,
) -> Result<ThermalFunction, CoolingError> {
    functions
        .iter()
        .find(|f| f.name == name)
        .cloned()
        .ok_or_else(|| CoolingError::NotFound(format!("thermal function '{}' not present", name)))
}

fn validate_block(block: &ThermalBlock) -> Result<(), CoolingError> {
    for function in &block.functions {
        if function.name.is_empty() {
            return Err(CoolingError::InvalidArgument(
                "thermal function with empty name".to_string(),
            ));
        }
    }
    Ok(())
}

/// ECT block loaded from a JSON file on disk.
#[derive(Debug, Clone)]
pub struct EctFile {
    config: EctConfig,
}

impl EctFile {
    pub fn load(path: &Path) -> Result<EctFile, CoolingError> {
        let data = fs::read_to_string(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                CoolingError::NotFound(format!("ECT block file {} missing", path.display()))
            } else {
                CoolingError::Io(e)
            }
        })?;
        let config: EctConfig =
            serde_json::from_str(&data).map_err(|e| CoolingError::Parse(e.to_string()))?;
        validate_block(&config.ap_thermal)?;
        Ok(EctFile { config })
    }
}

impl EctSource for EctFile {
    fn thermal_function(&self, name: &str) -> Result<ThermalFunction, CoolingError> {
        find_function(&self.config.ap_thermal.functions, name)
    }
}

/// ECT block held in memory, for hosts that embed the platform data.
#[derive(Debug, Clone)]
pub struct EctStatic {
    functions: Vec<ThermalFunction>,
}

impl EctStatic {
    pub fn new(functions: Vec<ThermalFunction>) -> Result<EctStatic, CoolingError> {
        validate_block(&ThermalBlock {
            functions: functions.clone(),
        })?;
        Ok(EctStatic { functions })
    }
}

impl EctSource for EctStatic {
    fn thermal_function(&self, name: &str) -> Result<ThermalFunction, CoolingError> {
        find_function(&self.functions, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn isp_function() -> ThermalFunction {
        ThermalFunction {
            name: "ISP".to_string(),
            range_list: vec![
                ThermalRange { lower_bound_temperature: 20, max_frequency: 30 },
                ThermalRange { lower_bound_temperature: 75, max_frequency: 15 },
                ThermalRange { lower_bound_temperature: 95, max_frequency: 7 },
            ],
        }
    }

    fn write_block(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_and_lookup() {
        let config = EctConfig {
            ap_thermal: ThermalBlock {
                functions: vec![isp_function()],
            },
        };
        let file = write_block(&serde_json::to_string_pretty(&config).unwrap());
        let source = EctFile::load(file.path()).unwrap();
        let function = source.thermal_function("ISP").unwrap();
        assert_eq!(function.range_list.len(), 3);
        assert_eq!(function.range_list[0].max_frequency, 30);
        assert_eq!(function.range_list[2].lower_bound_temperature, 95);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = EctFile::load(Path::new("/nonexistent/ect-block.json")).unwrap_err();
        assert!(matches!(err, CoolingError::NotFound(_)));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let file = write_block("{ not json");
        assert!(matches!(
            EctFile::load(file.path()),
            Err(CoolingError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_function_is_not_found() {
        let source = EctStatic::new(vec![isp_function()]).unwrap();
        assert!(matches!(
            source.thermal_function("GPU"),
            Err(CoolingError::NotFound(_))
        ));
        // Lookup is case-sensitive.
        assert!(matches!(
            source.thermal_function("isp"),
            Err(CoolingError::NotFound(_))
        ));
    }

    #[test]
    fn test_empty_function_name_rejected() {
        let mut function = isp_function();
        function.name.clear();
        assert!(matches!(
            EctStatic::new(vec![function]),
            Err(CoolingError::InvalidArgument(_))
        ));
    }
}
