//! Cursor pagination as a lazy stream.
//!
//! Each call to [`paginate`] starts from the beginning of the collection, so
//! a listing can be restarted simply by asking for a new stream. The stream
//! ends after a short page or an empty page.

use std::future::Future;

use futures::stream::{self, Stream, TryStreamExt};

use crate::backend::Backend;
use crate::error::{Result, SyncError};
use crate::model::{Document, Identified, StoredFile};

/// One page request: at most `limit` records after `cursor_after`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub cursor_after: Option<String>,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self {
            limit,
            cursor_after: None,
        }
    }
}

struct Cursor<F> {
    fetch: F,
    page_size: usize,
    after: Option<String>,
    exhausted: bool,
}

/// Fetch the page after the cursor and advance it.
async fn next_page<T, F, Fut>(mut cursor: Cursor<F>) -> Result<Option<(Vec<T>, Cursor<F>)>>
where
    T: Identified,
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    if cursor.exhausted {
        return Ok(None);
    }

    let request = PageRequest {
        limit: cursor.page_size,
        cursor_after: cursor.after.take(),
    };
    let page = (cursor.fetch)(request).await?;

    if page.len() < cursor.page_size {
        cursor.exhausted = true;
    }
    match page.last() {
        Some(last) => cursor.after = Some(last.cursor_id().to_string()),
        None => return Ok(None),
    }

    tracing::debug!(records = page.len(), "Fetched page");
    Ok(Some((page, cursor)))
}

/// Stream every record reachable through `fetch`, one page at a time.
pub fn paginate<'a, T, F, Fut>(page_size: usize, fetch: F) -> impl Stream<Item = Result<T>> + 'a
where
    T: Identified + 'a,
    F: FnMut(PageRequest) -> Fut + 'a,
    Fut: Future<Output = Result<Vec<T>>> + 'a,
{
    let cursor = Cursor {
        fetch,
        page_size: page_size.max(1),
        after: None,
        exhausted: false,
    };

    stream::try_unfold(cursor, next_page)
        .map_ok(|page| stream::iter(page.into_iter().map(Ok::<T, SyncError>)))
        .try_flatten()
}

/// All documents of a collection.
pub fn documents<'a>(
    backend: &'a dyn Backend,
    collection_id: &'a str,
    page_size: usize,
) -> impl Stream<Item = Result<Document>> + 'a {
    paginate(page_size, move |page| async move {
        backend.list_documents(collection_id, &page).await
    })
}

/// All files of a bucket.
pub fn files<'a>(
    backend: &'a dyn Backend,
    bucket_id: &'a str,
    page_size: usize,
) -> impl Stream<Item = Result<StoredFile>> + 'a {
    paginate(page_size, move |page| async move {
        backend.list_files(bucket_id, &page).await
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(String);

    impl Identified for Item {
        fn cursor_id(&self) -> &str {
            &self.0
        }
    }

    fn items(count: usize) -> Vec<Item> {
        (0..count).map(|i| Item(format!("id-{i:04}"))).collect()
    }

    /// Serve `all` in pages, recording every request.
    async fn drain(all: Vec<Item>, page_size: usize) -> (Vec<Item>, Vec<PageRequest>) {
        let requests = Mutex::new(Vec::new());
        let collected: Vec<Item> = paginate(page_size, |request: PageRequest| {
            requests.lock().unwrap().push(request.clone());
            let start = match &request.cursor_after {
                Some(after) => all.iter().position(|i| &i.0 == after).unwrap() + 1,
                None => 0,
            };
            let page: Vec<Item> = all.iter().skip(start).take(request.limit).cloned().collect();
            async move { Ok(page) }
        })
        .try_collect()
        .await
        .unwrap();
        (collected, requests.into_inner().unwrap())
    }

    #[tokio::test]
    async fn test_short_last_page_terminates() {
        let (collected, requests) = drain(items(250), 100).await;
        assert_eq!(collected, items(250));
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].cursor_after, None);
        assert_eq!(requests[1].cursor_after.as_deref(), Some("id-0099"));
        assert_eq!(requests[2].cursor_after.as_deref(), Some("id-0199"));
    }

    #[tokio::test]
    async fn test_exact_multiple_ends_on_empty_page() {
        let (collected, requests) = drain(items(200), 100).await;
        assert_eq!(collected.len(), 200);
        assert_eq!(requests.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_collection_single_request() {
        let (collected, requests) = drain(Vec::new(), 100).await;
        assert!(collected.is_empty());
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0], PageRequest::first(100));
    }

    #[tokio::test]
    async fn test_error_stops_stream() {
        let calls = AtomicUsize::new(0);
        let result: Result<Vec<Item>> = paginate(2, |_request| {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if call == 0 {
                    Ok(items(2))
                } else {
                    Err(SyncError::UpstreamFetchError("boom".into()))
                }
            }
        })
        .try_collect()
        .await;

        assert!(matches!(result, Err(SyncError::UpstreamFetchError(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stream_is_restartable() {
        let all = items(5);
        for _ in 0..2 {
            let (collected, requests) = drain(all.clone(), 2).await;
            assert_eq!(collected, all);
            assert_eq!(requests.len(), 3);
        }
    }
}
