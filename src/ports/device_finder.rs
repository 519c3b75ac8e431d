use std::sync::Arc;

use parking_lot::Mutex;

use super::SecureElement;
use crate::error::HsmResult;

/// An element shared by every session opened against it
pub type SharedElement<E> = Arc<Mutex<E>>;

pub trait DeviceFinder {
    type Element: SecureElement;

    fn find_first(&self) -> HsmResult<SharedElement<Self::Element>>;
}
