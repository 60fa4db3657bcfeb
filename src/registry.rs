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

//! Cooling device registry: id allocation, device records, and the
//! best-effort thermal-zone binding import performed at registration.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::json;

use crate::cooling::CoolingDevice;
use crate::ect::{EctSource, ThermalFunction};
use crate::logger;
use crate::table::{CoolingError, FpsTable};

/// Level cap for one configured temperature range, resolved from the
/// thermal-zone profile at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeCap {
    pub lower_bound_temperature: i32,
    pub max_frequency: u32,
    pub level: u32,
}

struct RegistryInner {
    devices: BTreeMap<u32, Arc<CoolingDevice>>,
}

/// Owner of all registered cooling devices. One mutex serializes id
/// allocation, release, and the device map.
pub struct CoolingRegistry {
    inner: Mutex<RegistryInner>,
}

impl CoolingRegistry {
    pub fn new() -> CoolingRegistry {
        CoolingRegistry {
            inner: Mutex::new(RegistryInner {
                devices: BTreeMap::new(),
            }),
        }
    }

    /// Register a cooling device over the given fps table. The device starts
    /// at level 0 and is named `thermal-isp-{id}`.
    pub fn register(&self, table: Arc<FpsTable>) -> Result<Arc<CoolingDevice>, CoolingError> {
        let device = {
            let mut inner = self.lock_inner();
            let id = lowest_free_id(&inner.devices)?;
            let device = Arc::new(CoolingDevice::new(id, table));
            inner.devices.insert(id, device.clone());
            device
        };
        logger::log_event(
            "cooling_register",
            json!({ "device": device.name(), "id": device.id() }),
        );
        Ok(device)
    }

    /// Register and pre-populate per-range level caps from the named
    /// thermal-zone profile. The import is best-effort: a missing profile, an
    /// unusable table, or unmatched frequencies never fail registration —
    /// losing an early-level cap is less harmful than losing fps clipping
    /// altogether.
    pub fn register_with_binding(
        &self,
        table: Arc<FpsTable>,
        source: &dyn EctSource,
        tz_name: &str,
    ) -> Result<Arc<CoolingDevice>, CoolingError> {
        let device = self.register(table)?;
        if let Ok(function) = source.thermal_function(tz_name) {
            let caps = parse_binding_caps(device.table(), &function);
            device.set_range_caps(caps);
        }
        Ok(device)
    }

    /// Drop the device record and release its id for reuse. Unknown ids are
    /// ignored. No event is broadcast on unregistration.
    pub fn unregister(&self, id: u32) {
        let removed = self.lock_inner().devices.remove(&id);
        if let Some(device) = removed {
            logger::log_event(
                "cooling_unregister",
                json!({ "device": device.name(), "id": id }),
            );
        }
    }

    pub fn device(&self, id: u32) -> Option<Arc<CoolingDevice>> {
        self.lock_inner().devices.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock_inner().devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_inner().devices.is_empty()
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CoolingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// Lowest unused id, reusing released ones.
fn lowest_free_id(devices: &BTreeMap<u32, Arc<CoolingDevice>>) -> Result<u32, CoolingError> {
    let mut id: u32 = 0;
    for &used in devices.keys() {
        if used != id {
            break;
        }
        id = id.checked_add(1).ok_or_else(|| {
            CoolingError::ResourceExhausted("cooling device id space exhausted".to_string())
        })?;
    }
    Ok(id)
}

// Resolve each configured frequency breakpoint to a level; a frequency with
// no table entry caps at max_level instead of being dropped.
fn parse_binding_caps(table: &FpsTable, function: &ThermalFunction) -> Vec<RangeCap> {
    let max_level = match table.max_level() {
        Ok(level) => level,
        Err(_) => return Vec::new(),
    };
    let mut caps = Vec::with_capacity(function.range_list.len());
    for range in &function.range_list {
        let level = table
            .fps_to_level(range.max_frequency)
            .unwrap_or(max_level);
        logger::log_event(
            "ect_binding_cap",
            json!({
                "function": function.name,
                "temperature": range.lower_bound_temperature,
                "frequency": range.max_frequency,
                "level": level,
            }),
        );
        caps.push(RangeCap {
            lower_bound_temperature: range.lower_bound_temperature,
            max_frequency: range.max_frequency,
            level,
        });
    }
    caps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ect::{EctStatic, MockEctSource, ThermalRange};

    fn table() -> Arc<FpsTable> {
        Arc::new(FpsTable::from_fps(&[30, 15, 7]).unwrap())
    }

    #[test]
    fn test_register_assigns_sequential_ids() {
        let registry = CoolingRegistry::new();
        let a = registry.register(table()).unwrap();
        let b = registry.register(table()).unwrap();
        let c = registry.register(table()).unwrap();
        assert_eq!((a.id(), b.id(), c.id()), (0, 1, 2));
        assert_eq!(a.name(), "thermal-isp-0");
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_unregister_releases_id_for_reuse() {
        let registry = CoolingRegistry::new();
        let _a = registry.register(table()).unwrap();
        let b = registry.register(table()).unwrap();
        let _c = registry.register(table()).unwrap();

        registry.unregister(b.id());
        assert_eq!(registry.len(), 2);
        assert!(registry.device(b.id()).is_none());

        let d = registry.register(table()).unwrap();
        assert_eq!(d.id(), 1);
    }

    #[test]
    fn test_unregister_unknown_id_is_noop() {
        let registry = CoolingRegistry::new();
        registry.unregister(7);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_device_lookup() {
        let registry = CoolingRegistry::new();
        let dev = registry.register(table()).unwrap();
        let found = registry.device(dev.id()).unwrap();
        assert_eq!(found.name(), dev.name());
    }

    #[test]
    fn test_binding_caps_resolved_from_profile() {
        let registry = CoolingRegistry::new();
        let source = EctStatic::new(vec![ThermalFunction {
            name: "ISP".to_string(),
            range_list: vec![
                ThermalRange { lower_bound_temperature: 20, max_frequency: 30 },
                ThermalRange { lower_bound_temperature: 75, max_frequency: 15 },
                ThermalRange { lower_bound_temperature: 95, max_frequency: 7 },
            ],
        }])
        .unwrap();

        let dev = registry
            .register_with_binding(table(), &source, "ISP")
            .unwrap();
        let caps = dev.range_caps();
        assert_eq!(caps.len(), 3);
        assert_eq!(caps[0].level, 0);
        assert_eq!(caps[1].level, 1);
        assert_eq!(caps[2].level, 2);
        assert_eq!(caps[2].lower_bound_temperature, 95);
    }

    #[test]
    fn test_unmatched_frequency_caps_at_max_level() {
        let registry = CoolingRegistry::new();
        let source = EctStatic::new(vec![ThermalFunction {
            name: "ISP".to_string(),
            range_list: vec![
                ThermalRange { lower_bound_temperature: 20, max_frequency: 30 },
                ThermalRange { lower_bound_temperature: 95, max_frequency: 9999 },
            ],
        }])
        .unwrap();

        let dev = registry
            .register_with_binding(table(), &source, "ISP")
            .unwrap();
        let caps = dev.range_caps();
        assert_eq!(caps[0].level, 0);
        assert_eq!(caps[1].level, 2);
    }

    #[test]
    fn test_missing_profile_never_fails_registration() {
        let registry = CoolingRegistry::new();
        let mut source = MockEctSource::new();
        source
            .expect_thermal_function()
            .returning(|name| Err(CoolingError::NotFound(format!("no function '{}'", name))));

        let dev = registry
            .register_with_binding(table(), &source, "ISP")
            .unwrap();
        assert!(dev.range_caps().is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unusable_table_skips_binding_but_registers() {
        let registry = CoolingRegistry::new();
        let empty = Arc::new(FpsTable::from_fps(&[]).unwrap());
        let source = EctStatic::new(vec![ThermalFunction {
            name: "ISP".to_string(),
            range_list: vec![ThermalRange { lower_bound_temperature: 20, max_frequency: 30 }],
        }])
        .unwrap();

        let dev = registry
            .register_with_binding(empty, &source, "ISP")
            .unwrap();
        assert!(dev.range_caps().is_empty());
        assert_eq!(registry.len(), 1);
    }
}
