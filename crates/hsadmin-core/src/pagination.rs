//! Cursor-driven walks over paginated listing endpoints.
//!
//! # Design
//! - A fetch callback maps a cursor to one page; the walk ends after the first
//!   page without a continuation cursor, which is still delivered.
//! - A fetch that yields no page at all (the response lacked its listing) is
//!   handled per [`OnMalformed`]: by default the walk ends quietly.
//! - Fetch errors are delivered once and end the walk.
//! - [`Paginator`] drives blocking callbacks as an [`Iterator`];
//!   [`paginate_stream`] drives async callbacks as a [`Stream`]. Both share the
//!   same cursor state.

use std::future::Future;

use futures_util::Stream;
use futures_util::stream;
use thiserror::Error;

/// One page of a listing plus the cursor of the page after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T, C> {
    /// Entries in server order.
    pub items: Vec<T>,
    /// Continuation cursor; `None` marks the final page.
    pub next: Option<C>,
}

impl<T, C> Page<T, C> {
    /// Page followed by another one at `next`.
    #[must_use]
    pub const fn new(items: Vec<T>, next: Option<C>) -> Self {
        Self { items, next }
    }

    /// Final page of a listing.
    #[must_use]
    pub const fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }

    /// Whether no further page follows.
    #[must_use]
    pub const fn is_last(&self) -> bool {
        self.next.is_none()
    }
}

/// A fetched response that did not carry the expected listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("page {index} of the listing is malformed")]
pub struct MalformedPage {
    /// Zero-based position of the page within the walk.
    pub index: usize,
}

/// Errors delivered by a pagination walk.
#[derive(Debug, Error)]
pub enum PageError<E> {
    /// The fetch callback failed.
    #[error("page fetch failed")]
    Fetch(#[source] E),
    /// The response lacked its listing and the walk runs under [`OnMalformed::Fail`].
    #[error(transparent)]
    Malformed(#[from] MalformedPage),
}

/// What a walk does when a fetched response lacks its listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnMalformed {
    /// End the walk, keeping the pages already delivered.
    #[default]
    Stop,
    /// Deliver a [`MalformedPage`] error, then end the walk.
    Fail,
}

#[derive(Debug)]
struct Walk<C> {
    cursor: Option<C>,
    index: usize,
    policy: OnMalformed,
}

impl<C: Clone> Walk<C> {
    const fn new(initial: C, policy: OnMalformed) -> Self {
        Self {
            cursor: Some(initial),
            index: 0,
            policy,
        }
    }

    fn take_cursor(&mut self) -> Option<C> {
        self.cursor.take()
    }

    fn accept<T, E>(
        &mut self,
        fetched: Result<Option<Page<T, C>>, E>,
    ) -> Option<Result<Page<T, C>, PageError<E>>> {
        let index = self.index;
        self.index += 1;
        match fetched {
            Ok(Some(page)) => {
                self.cursor.clone_from(&page.next);
                Some(Ok(page))
            }
            Ok(None) => {
                tracing::warn!(page = index, "listing response malformed; ending walk");
                match self.policy {
                    OnMalformed::Stop => None,
                    OnMalformed::Fail => Some(Err(MalformedPage { index }.into())),
                }
            }
            Err(err) => Some(Err(PageError::Fetch(err))),
        }
    }
}

/// Blocking pagination walk.
///
/// The callback returns `Ok(None)` when a response lacked its listing.
#[derive(Debug)]
pub struct Paginator<F, C> {
    fetch: F,
    walk: Walk<C>,
}

impl<F, C: Clone> Paginator<F, C> {
    /// Walk starting from `initial`, stopping quietly on malformed pages.
    pub const fn new(fetch: F, initial: C) -> Self {
        Self {
            fetch,
            walk: Walk::new(initial, OnMalformed::Stop),
        }
    }

    /// Override how malformed pages are handled.
    #[must_use]
    pub const fn on_malformed(mut self, policy: OnMalformed) -> Self {
        self.walk.policy = policy;
        self
    }
}

impl<F, T, C, E> Iterator for Paginator<F, C>
where
    F: FnMut(C) -> Result<Option<Page<T, C>>, E>,
    C: Clone,
{
    type Item = Result<Page<T, C>, PageError<E>>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.walk.take_cursor()?;
        let fetched = (self.fetch)(cursor);
        self.walk.accept(fetched)
    }
}

/// Blocking walk over `fetch`, starting at `initial`.
pub const fn paginate<F, T, C, E>(fetch: F, initial: C) -> Paginator<F, C>
where
    F: FnMut(C) -> Result<Option<Page<T, C>>, E>,
    C: Clone,
{
    Paginator::new(fetch, initial)
}

/// Async walk over `fetch`, starting at `initial`.
///
/// Pages are fetched one at a time, only when the consumer polls for the next
/// one.
pub fn paginate_stream<F, Fut, T, C, E>(
    fetch: F,
    initial: C,
    policy: OnMalformed,
) -> impl Stream<Item = Result<Page<T, C>, PageError<E>>>
where
    F: FnMut(C) -> Fut,
    Fut: Future<Output = Result<Option<Page<T, C>>, E>>,
    C: Clone,
{
    stream::unfold(
        (fetch, Walk::new(initial, policy)),
        |(mut fetch, mut walk)| async move {
            let Some(cursor) = walk.take_cursor() else {
                return None;
            };
            let fetched = fetch(cursor).await;
            walk.accept(fetched).map(|item| (item, (fetch, walk)))
        },
    )
}
