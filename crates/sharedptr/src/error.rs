use std::alloc::Layout;
use thiserror::Error;

/// The errors that can be produced while creating or converting handles
#[derive(Error, Debug)]
pub enum Error {
    /// The storage strategy was unable to provide memory for a control block
    #[error("Unable to allocate a control block ({size} bytes, aligned to {align})")]
    AllocationFailed {
        /// The size of the requested block
        size: usize,
        /// The alignment of the requested block
        align: usize,
    },
    /// The managed object's constructor failed during in-place construction
    ///
    /// The control block's storage has already been reclaimed when this is returned.
    #[error("Failed to construct the managed object")]
    Construction(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// A conversion was rejected because the object's dynamic type is incompatible
    #[error("Unable to convert '{from}' into '{to}'")]
    IncompatibleType {
        /// The pointee type of the source handle
        from: &'static str,
        /// The requested pointee type
        to: &'static str,
    },
    /// A conversion needed the managed object, but it has already been destroyed
    #[error("The managed object has already been destroyed")]
    Expired,
}

impl Error {
    pub(crate) fn allocation_failed(layout: Layout) -> Self {
        Self::AllocationFailed {
            size: layout.size(),
            align: layout.align(),
        }
    }

    pub(crate) fn incompatible_type<T: ?Sized, U: ?Sized>() -> Self {
        Self::IncompatibleType {
            from: std::any::type_name::<T>(),
            to: std::any::type_name::<U>(),
        }
    }
}

/// The result type used by fallible handle operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_failure_message() {
        let error = Error::allocation_failed(Layout::new::<[u64; 4]>());
        assert_eq!(
            error.to_string(),
            "Unable to allocate a control block (32 bytes, aligned to 8)"
        );
    }

    #[test]
    fn construction_failure_keeps_source() {
        let error = Error::Construction("bad input".into());
        let source = std::error::Error::source(&error).map(|source| source.to_string());
        assert_eq!(source.as_deref(), Some("bad input"));
    }

    #[test]
    fn incompatible_type_names_both_sides() {
        let error = Error::incompatible_type::<u8, str>();
        assert_eq!(error.to_string(), "Unable to convert 'u8' into 'str'");
    }
}
