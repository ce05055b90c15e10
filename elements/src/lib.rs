// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

pub mod bus_trait;
pub mod display_trait;
pub mod imu_trait;
