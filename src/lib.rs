// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

pub mod imu6050;
pub mod level_loop;
pub mod retry;
pub mod rppal_bus;
pub mod tilt_estimator;
pub mod unicorn_hat_hd;
