//! Ripple Core - Change and change-set data model for ripple.
//!
//! This crate provides the types every other ripple crate speaks:
//!
//! - `Change<T>`: one atomic edit to a list item or contiguous range
//! - `ChangeSet<T>`: the ordered changes of one edit session, with counters
//! - `KeyedChange<K, V>` / `KeyedChangeSet<K, V>`: the keyed equivalents
//! - `PageRequest`, `PageResponse`, `PagedChangeSet<T>`: paging metadata
//! - `Error`: error types shared by stores and operators
//!
//! # Example
//!
//! ```rust
//! use ripple_core::{Change, ChangeSet};
//!
//! let changes = ChangeSet::from_changes(vec![
//!     Change::AddRange { items: vec![1, 2, 3], index: 0 },
//!     Change::Remove { item: 2, index: 1 },
//! ]);
//! assert_eq!(changes.adds(), 3);
//! assert_eq!(changes.removes(), 1);
//!
//! let mut mirror = Vec::new();
//! changes.apply_to(&mut mirror).unwrap();
//! assert_eq!(mirror, vec![1, 3]);
//! ```

#![no_std]

extern crate alloc;

mod change;
mod change_set;
mod error;
pub mod keyed;
pub mod paged;

pub use change::{Change, ListChangeReason};
pub use change_set::ChangeSet;
pub use error::{Error, Result};
pub use keyed::{ChangeReason, KeyedChange, KeyedChangeSet};
pub use paged::{PageRequest, PageResponse, PagedChangeSet};
