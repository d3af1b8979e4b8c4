//! Cursor-based pagination for list endpoints.
//!
//! A cursor is the id of the last row a client has already seen. Lists are
//! returned newest first, so the next page holds rows with a smaller id.

use serde::{Deserialize, Serialize};

use crate::error::RpcError;

/// Default page size when `count` is not specified.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Maximum allowed page size.
pub const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    /// Opaque cursor from a previous response.
    pub cursor: Option<String>,
    /// Number of items per page (default 100, max 1000).
    pub count: Option<u32>,
}

impl PaginationParams {
    /// Effective page size, clamped to `[1, MAX_PAGE_SIZE]`.
    pub fn effective_count(&self) -> u32 {
        self.count
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    /// The id to continue below, if any. A malformed cursor is a client error.
    pub fn decode_cursor(&self) -> Result<Option<u64>, RpcError> {
        match self.cursor.as_deref() {
            None | Some("") => Ok(None),
            Some(c) => c
                .parse::<u64>()
                .map(Some)
                .map_err(|_| RpcError::InvalidRequest(format!("malformed cursor '{c}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginationMeta {
    /// Cursor for the next page; absent on the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Take one page from `items` (already newest first) after `cursor`.
pub fn paginate<T>(
    items: Vec<T>,
    params: &PaginationParams,
    id_of: impl Fn(&T) -> u64,
) -> Result<(Vec<T>, PaginationMeta), RpcError> {
    let page_size = params.effective_count() as usize;
    let after = params.decode_cursor()?;

    let mut remaining = items
        .into_iter()
        .filter(|item| after.map_or(true, |cursor| id_of(item) < cursor));
    let page: Vec<T> = remaining.by_ref().take(page_size).collect();
    let more = remaining.next().is_some();

    let cursor = match page.last() {
        Some(last) if more => Some(id_of(last).to_string()),
        _ => None,
    };
    Ok((page, PaginationMeta { cursor }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(cursor: Option<&str>, count: Option<u32>) -> PaginationParams {
        PaginationParams {
            cursor: cursor.map(str::to_string),
            count,
        }
    }

    #[test]
    fn walks_pages_newest_first() {
        let ids: Vec<u64> = (1..=5).rev().collect();

        let (first, meta) = paginate(ids.clone(), &params(None, Some(2)), |id| *id).unwrap();
        assert_eq!(first, vec![5, 4]);
        assert_eq!(meta.cursor.as_deref(), Some("4"));

        let (second, meta) = paginate(ids.clone(), &params(Some("4"), Some(2)), |id| *id).unwrap();
        assert_eq!(second, vec![3, 2]);

        let (last, meta_last) =
            paginate(ids, &params(meta.cursor.as_deref(), Some(2)), |id| *id).unwrap();
        assert_eq!(last, vec![1]);
        assert!(meta_last.cursor.is_none());
    }

    #[test]
    fn exact_final_page_has_no_cursor() {
        let (page, meta) = paginate(vec![2u64, 1], &params(None, Some(2)), |id| *id).unwrap();
        assert_eq!(page.len(), 2);
        assert!(meta.cursor.is_none());
    }

    #[test]
    fn effective_count_clamps() {
        assert_eq!(params(None, None).effective_count(), 100);
        assert_eq!(params(None, Some(5000)).effective_count(), 1000);
        assert_eq!(params(None, Some(0)).effective_count(), 1);
    }

    #[test]
    fn rejects_garbage_cursor() {
        assert!(params(Some("abc"), None).decode_cursor().is_err());
    }
}
