use serde::Serialize;

/// One listing page plus the total row count, computed independently of
/// the page so callers can derive "page N of M".
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub total: i64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(total: i64, items: Vec<T>) -> Self {
        Self { total, items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
