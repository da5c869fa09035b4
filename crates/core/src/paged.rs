//! Page requests, responses and paged change sets.

use crate::change_set::ChangeSet;
use crate::error::{Error, Result};
use alloc::vec::Vec;
use core::fmt;
use core::ops::Range;

/// A request for one page of a sequence. Pages are numbered from 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PageRequest {
    page: usize,
    size: usize,
}

impl PageRequest {
    /// Creates a page request, rejecting a zero page number or page size.
    pub fn new(page: usize, size: usize) -> Result<Self> {
        if page == 0 {
            return Err(Error::configuration("page", "page numbers start at 1"));
        }
        if size == 0 {
            return Err(Error::configuration("size", "page size must be greater than zero"));
        }
        Ok(Self { page, size })
    }

    /// Requests the first page with the given size.
    pub fn first(size: usize) -> Result<Self> {
        Self::new(1, size)
    }

    #[inline]
    pub fn page(&self) -> usize {
        self.page
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Resolves this request against a sequence of `total_items` items.
    ///
    /// A page beyond the end is clamped to the last page; an empty sequence
    /// resolves to page 1 of 0.
    pub fn resolve(&self, total_items: usize) -> PageResponse {
        let total_pages = total_items.div_ceil(self.size);
        let page = self.page.min(total_pages).max(1);
        PageResponse {
            page,
            page_size: self.size,
            total_items,
            total_pages,
        }
    }
}

/// Metadata describing the page a window currently shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PageResponse {
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

impl PageResponse {
    /// Returns the offsets of the window into the underlying sequence.
    pub fn window(&self) -> Range<usize> {
        let start = ((self.page - 1) * self.page_size).min(self.total_items);
        let end = (start + self.page_size).min(self.total_items);
        start..end
    }
}

impl fmt::Display for PageResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Page: {}, PageSize: {}, Pages: {}, TotalSize: {}",
            self.page, self.page_size, self.total_pages, self.total_items
        )
    }
}

/// The changes that brought a page window up to date, with the page metadata
/// and the resulting window contents.
///
/// Two paged change sets are equal when their windows are equal, regardless of
/// the edits that produced them.
#[derive(Clone, Debug)]
pub struct PagedChangeSet<T> {
    changes: ChangeSet<T>,
    response: PageResponse,
    items: Vec<T>,
}

impl<T> PagedChangeSet<T> {
    pub fn new(changes: ChangeSet<T>, response: PageResponse, items: Vec<T>) -> Self {
        Self {
            changes,
            response,
            items,
        }
    }

    /// The changes applied to the window.
    #[inline]
    pub fn changes(&self) -> &ChangeSet<T> {
        &self.changes
    }

    #[inline]
    pub fn response(&self) -> PageResponse {
        self.response
    }

    /// The window contents after the changes.
    #[inline]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_parts(self) -> (ChangeSet<T>, PageResponse, Vec<T>) {
        (self.changes, self.response, self.items)
    }
}

impl<T: PartialEq> PartialEq for PagedChangeSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<T: Eq> Eq for PagedChangeSet<T> {}

impl<T> fmt::Display for PagedChangeSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, Response: {}, Items: {}",
            self.changes,
            self.response,
            self.items.len()
        )
    }
}
