/*
 * This file is part of laptopctl.
 *
 * Copyright (C) 2025 laptopctl contributors
 *
 * laptopctl is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * laptopctl is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with laptopctl. If not, see <https://www.gnu.org/licenses/>.
 */

//! Error types, re-exported from the `lc-error` crate

pub use lc_error::{ErrorKind, LaptopctlError, Result};
