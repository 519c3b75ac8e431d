//! Element identity, randomness and monitors

use std::sync::Arc;

use crate::error::HsmResult;
use crate::model::{EventChannel, PerimeterEvent, TapEvent};

/// Identity strings of an element
pub trait DeviceInfo {
    fn model_number(&self) -> String;
    fn firmware_version(&self) -> String;
    fn serial_number(&self) -> String;
}

/// Capability to produce random bytes from the element's generator
pub trait RandomSource {
    fn fill_random(&mut self, len: usize) -> HsmResult<Vec<u8>>;
}

/// Event feeds of the element
///
/// Channels are shared so callers can block on them without holding the
/// element lock.
pub trait Monitor {
    fn perimeter_events(&self) -> Arc<EventChannel<PerimeterEvent>>;
    fn tap_events(&self) -> Arc<EventChannel<TapEvent>>;
}
