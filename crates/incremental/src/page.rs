//! Windowed paging.
//!
//! `Pager` mirrors an upstream list and exposes one page of it. Whenever the
//! data or the requested page changes, the new window is diffed against the
//! previous one so subscribers receive only what entered, left or shifted.

use parking_lot::Mutex;
use ripple_core::{Change, ChangeSet, PageRequest, PageResponse, PagedChangeSet};
use ripple_reactive::{Observer, Stream, Subscription};
use std::sync::Arc;
use tracing::debug;

/// Paging state for one subscription.
pub struct Pager<T> {
    mirror: Vec<T>,
    window: Vec<T>,
    request: Option<PageRequest>,
    response: Option<PageResponse>,
}

impl<T: Clone + PartialEq> Default for Pager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + PartialEq> Pager<T> {
    pub fn new() -> Self {
        Self {
            mirror: Vec::new(),
            window: Vec::new(),
            request: None,
            response: None,
        }
    }

    /// Returns the items of the current page.
    pub fn window(&self) -> &[T] {
        &self.window
    }

    /// Returns the metadata of the last emitted page.
    pub fn response(&self) -> Option<PageResponse> {
        self.response
    }

    /// Folds an upstream change set in. Returns the page update it caused,
    /// if any.
    ///
    /// Panics if `changes` does not apply to the mirrored upstream.
    pub fn apply_changes(&mut self, changes: &ChangeSet<T>) -> Option<PagedChangeSet<T>> {
        if let Err(error) = changes.apply_to(&mut self.mirror) {
            panic!("paged mirror is out of sync with its source: {error}");
        }
        self.refresh()
    }

    /// Switches to `request`. Returns the page update it caused, if any.
    pub fn apply_request(&mut self, request: PageRequest) -> Option<PagedChangeSet<T>> {
        self.request = Some(request);
        self.refresh()
    }

    fn refresh(&mut self) -> Option<PagedChangeSet<T>> {
        let request = self.request?;
        let response = request.resolve(self.mirror.len());
        let window = self.mirror[response.window()].to_vec();
        let changes = window_changes(&self.window, &window);
        if changes.is_empty() && self.response == Some(response) {
            return None;
        }
        if self.response.map(|last| last.page) != Some(response.page) {
            debug!(page = response.page, total_pages = response.total_pages, "page changed");
        }
        self.window.clone_from(&window);
        self.response = Some(response);
        Some(PagedChangeSet::new(changes, response, window))
    }
}

/// Computes the changes that turn `old` into `new`.
///
/// Items only in `old` are removed (highest index first), items only in `new`
/// are added, and retained items that changed position are moved. Items are
/// matched by equality; duplicates are matched one for one.
pub fn window_changes<T: Clone + PartialEq>(old: &[T], new: &[T]) -> ChangeSet<T> {
    let mut out = ChangeSet::empty();

    let mut matched = vec![false; new.len()];
    let mut retained = vec![false; old.len()];
    for (i, item) in old.iter().enumerate() {
        let found = new
            .iter()
            .enumerate()
            .position(|(j, candidate)| !matched[j] && candidate == item);
        if let Some(j) = found {
            matched[j] = true;
            retained[i] = true;
        }
    }

    let mut current: Vec<T> = Vec::with_capacity(new.len());
    for (i, item) in old.iter().enumerate().rev() {
        if !retained[i] {
            out.push(Change::Remove {
                item: item.clone(),
                index: i,
            });
        }
    }
    current.extend(
        old.iter()
            .zip(&retained)
            .filter(|(_, kept)| **kept)
            .map(|(item, _)| item.clone()),
    );

    for (j, item) in new.iter().enumerate() {
        if current.get(j) == Some(item) {
            continue;
        }
        let later = current
            .iter()
            .skip(j + 1)
            .position(|candidate| candidate == item)
            .map(|offset| offset + j + 1);
        match later {
            Some(k) => {
                let moved = current.remove(k);
                current.insert(j, moved);
                out.push(Change::Moved {
                    item: item.clone(),
                    previous_index: k,
                    current_index: j,
                });
            }
            None => {
                current.insert(j, item.clone());
                out.push(Change::Add {
                    item: item.clone(),
                    index: j,
                });
            }
        }
    }
    out
}

struct PageObserver<T> {
    pager: Arc<Mutex<Pager<T>>>,
    downstream: Arc<dyn Observer<PagedChangeSet<T>>>,
}

impl<T: Clone + PartialEq + Send + Sync> PageObserver<T> {
    fn forward(&self, update: Option<PagedChangeSet<T>>) {
        if let Some(update) = update {
            self.downstream.on_next(&update);
        }
    }
}

impl<T: Clone + PartialEq + Send + Sync> Observer<ChangeSet<T>> for PageObserver<T> {
    fn on_next(&self, changes: &ChangeSet<T>) {
        let update = self.pager.lock().apply_changes(changes);
        self.forward(update);
    }

    fn on_completed(&self) {
        self.downstream.on_completed();
    }
}

impl<T: Clone + PartialEq + Send + Sync> Observer<PageRequest> for PageObserver<T> {
    fn on_next(&self, request: &PageRequest) {
        let update = self.pager.lock().apply_request(*request);
        self.forward(update);
    }
}

/// Pages `upstream` according to the requests published on `requests`.
///
/// Nothing is emitted before the first request arrives.
pub fn page<T>(upstream: &Stream<ChangeSet<T>>, requests: &Stream<PageRequest>) -> Stream<PagedChangeSet<T>>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    let upstream = upstream.clone();
    let requests = requests.clone();
    Stream::new(move |downstream: Arc<dyn Observer<PagedChangeSet<T>>>| {
        let observer = Arc::new(PageObserver {
            pager: Arc::new(Mutex::new(Pager::new())),
            downstream,
        });
        let data: Arc<dyn Observer<ChangeSet<T>>> = observer.clone();
        let paging: Arc<dyn Observer<PageRequest>> = observer;
        let data_subscription = upstream.subscribe_observer(data);
        data_subscription.merge(requests.subscribe_observer(paging))
    })
}

/// Pages `upstream` with a single fixed request.
pub fn page_with<T>(upstream: &Stream<ChangeSet<T>>, request: PageRequest) -> Stream<PagedChangeSet<T>>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    let requests = Stream::new(move |observer: Arc<dyn Observer<PageRequest>>| {
        observer.on_next(&request);
        Subscription::empty()
    });
    page(upstream, &requests)
}
