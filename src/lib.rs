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

//! Ispcool - ISP thermal cooling device library
//!
//! Maps thermal-zone-requested cooling levels to ISP frame-rate caps and
//! notifies subscribers when the cap changes. The fps table is built once
//! from the platform thermal configuration (ECT) and stays immutable; level
//! translation, the cooling state machine, and the device registry are
//! invoked in-process by the host thermal framework.

pub mod cooling;
pub mod ect;
pub mod logger;
pub mod registry;
pub mod table;
