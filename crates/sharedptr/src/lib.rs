//! Shared ownership with strong and weak reference-counted handles
//!
//! A [`Shared`] handle keeps its object alive, while a [`Weak`] handle observes the object
//! without extending its lifetime. All handles created from the same original allocation share
//! a single control block that tracks two independent counts:
//!
//! - the strong count, which decides when the managed object is destroyed,
//! - the weak count, which together with the strong count decides when the control block's own
//!   storage is reclaimed.
//!
//! Control blocks come in two flavours:
//!
//! - owning blocks, created by [`Shared::from_box`] or the `from_raw` family, point at an
//!   object that was allocated separately, and destroy it with a [`Deleter`].
//! - colocated blocks, created by [`Shared::new`] or [`make_shared`], embed the object inside
//!   the block so that a single allocation serves both.
//!
//! The storage for either kind of block is provided by a [`Storage`] strategy, which defaults
//! to the global allocator.
//!
//! Types that implement [`SharedFromThis`] can hand out new strong handles to themselves that
//! share the control block of their original owner.
//!
//! # Example
//!
//! ```
//! use sharedptr::{Shared, Weak};
//!
//! let a = Shared::new(String::from("hello"));
//! let b = a.clone();
//! let observer = Shared::downgrade(&a);
//!
//! assert_eq!(Shared::use_count(&a), 2);
//! assert_eq!(*b, "hello");
//!
//! drop(a);
//! drop(b);
//!
//! assert!(observer.expired());
//! assert!(Shared::get(&observer.lock()).is_none());
//! ```
//!
//! # Reference cycles
//!
//! Counting doesn't detect cycles: two objects that hold strong handles to each other will
//! never be destroyed. Use [`Weak`] for back-references in cyclic structures.
//!
//! # Threads
//!
//! Counts are plain integers and handles are neither `Send` nor `Sync`.

#![warn(missing_docs)]

#[cfg(feature = "log")]
macro_rules! log_trace {
    ($($arg:tt)+) => {
        log::trace!(target: "sharedptr", $($arg)+)
    };
}

#[cfg(not(feature = "log"))]
macro_rules! log_trace {
    ($($arg:tt)+) => {{
        let _ = format_args!($($arg)+);
    }};
}

#[cfg(feature = "log")]
macro_rules! log_debug {
    ($($arg:tt)+) => {
        log::debug!(target: "sharedptr", $($arg)+)
    };
}

#[cfg(not(feature = "log"))]
macro_rules! log_debug {
    ($($arg:tt)+) => {{
        let _ = format_args!($($arg)+);
    }};
}

mod address;
mod block;
mod cast;
mod error;
mod factory;
mod observe;
mod shared;
mod strategy;
mod weak;

pub use crate::{
    address::Address,
    cast::Cast,
    error::{Error, Result},
    factory::{allocate_shared, create_owned, make_shared, make_shared_with},
    observe::{SelfRef, SharedFromThis},
    shared::Shared,
    strategy::{DefaultDelete, Deleter, Global, Storage},
    weak::Weak,
};
