use serde::Serialize;

/// One page of query results.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Number of matching roots ignoring paging; only set when requested.
    pub total: Option<u64>,
}

impl<T> Page<T> {
    #[must_use]
    pub fn empty(total: Option<u64>) -> Self {
        Self {
            items: Vec::new(),
            total,
        }
    }

    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}
