use std::{
    fmt,
    hash::{Hash, Hasher},
    ptr,
};

/// A wrapper for comparing and hashing the addresses of managed objects
///
/// The address of an empty handle is null.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Address(*const u8);

impl Address {
    /// The address reported by handles that don't refer to an object
    pub const fn null() -> Self {
        Self(ptr::null())
    }

    /// Returns true if this is the address of an empty handle
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }
}

impl<T: ?Sized> From<*const T> for Address {
    fn from(pointer: *const T) -> Self {
        Self(pointer as *const u8)
    }
}

impl<T: ?Sized> From<&T> for Address {
    fn from(reference: &T) -> Self {
        Self::from(reference as *const T)
    }
}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.0 as *const () as usize);
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}
