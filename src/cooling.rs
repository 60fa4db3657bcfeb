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

//! Cooling device state machine and throttling notification.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::json;

use crate::logger;
use crate::registry::RangeCap;
use crate::table::{CoolingError, FpsTable};

/// Throttling change, carrying the newly committed cooling level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleEvent {
    pub level: u32,
}

/// Subscriber to throttling changes. Observers are invoked synchronously on
/// the thread that called [`CoolingDevice::set_cur_state`], in registration
/// order.
pub trait CoolingNotifier: Send + Sync {
    fn throttle_changed(&self, event: &ThrottleEvent);
}

struct DeviceState {
    current_level: u32,
    notifiers: Vec<Arc<dyn CoolingNotifier>>,
    range_caps: Vec<RangeCap>,
}

/// One registered ISP cooling endpoint.
///
/// `current_level` and the observer list live behind the device's own mutex;
/// callers need no external serialization. Notification happens after the
/// lock is dropped, so a notifier may query the device re-entrantly.
pub struct CoolingDevice {
    id: u32,
    name: String,
    table: Arc<FpsTable>,
    state: Mutex<DeviceState>,
}

impl CoolingDevice {
    pub(crate) fn new(id: u32, table: Arc<FpsTable>) -> CoolingDevice {
        CoolingDevice {
            id,
            name: format!("thermal-isp-{}", id),
            table,
            state: Mutex::new(DeviceState {
                current_level: 0,
                notifiers: Vec::new(),
                range_caps: Vec::new(),
            }),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &FpsTable {
        &self.table
    }

    /// Append an observer; delivery order follows registration order.
    pub fn add_notifier(&self, notifier: Arc<dyn CoolingNotifier>) {
        self.lock_state().notifiers.push(notifier);
    }

    /// Per-range level caps imported from the thermal-zone profile at
    /// registration, empty when the best-effort import found nothing.
    pub fn range_caps(&self) -> Vec<RangeCap> {
        self.lock_state().range_caps.clone()
    }

    pub(crate) fn set_range_caps(&self, caps: Vec<RangeCap>) {
        self.lock_state().range_caps = caps;
    }

    /// Max cooling state callback: delegates to the fps table.
    pub fn get_max_state(&self) -> Result<u32, CoolingError> {
        self.table.max_level()
    }

    /// Current cooling state callback.
    pub fn get_cur_state(&self) -> u32 {
        self.lock_state().current_level
    }

    /// Set cooling state callback: the apply step.
    ///
    /// Setting the level the device already holds is a successful no-op and
    /// emits nothing. A real change commits, then broadcasts one throttling
    /// event carrying the new level. The level is deliberately not checked
    /// against `get_max_state`; the host framework clamps requested states
    /// before calling in.
    pub fn set_cur_state(&self, state: u32) -> Result<(), CoolingError> {
        let notifiers = {
            let mut st = self.lock_state();
            if st.current_level == state {
                return Ok(());
            }
            st.current_level = state;
            st.notifiers.clone()
        };

        logger::log_event(
            "isp_throttling",
            json!({ "device": self.name, "level": state }),
        );

        let event = ThrottleEvent { level: state };
        for notifier in notifiers {
            notifier.throttle_changed(&event);
        }
        Ok(())
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
