//! Security utilities

pub mod timing;

pub use timing::{add_auth_delay, constant_time_eq, AuthTimer};
