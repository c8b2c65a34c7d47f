//! Page-number pagination.

use serde::Serialize;

pub const MAX_PAGE_SIZE: u64 = 100;

/// Which slice of a listing to return. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
  pub page:  u64,
  pub limit: u64,
}

impl PageRequest {
  /// Build a request from optional `page` / `limit` query parameters.
  /// `limit` is clamped to `1..=MAX_PAGE_SIZE`. Returns `None` for page 0.
  pub fn new(page: Option<u64>, limit: Option<u64>, default_limit: u64) -> Option<Self> {
    let page = page.unwrap_or(1);
    if page == 0 {
      return None;
    }
    let limit = limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE);
    Some(Self { page, limit })
  }

  pub fn offset(&self) -> u64 { (self.page - 1).saturating_mul(self.limit) }
}

/// One page of results plus the total row count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
  pub count:    u64,
  /// Next page number, if any.
  pub next:     Option<u64>,
  /// Previous page number, if any.
  pub previous: Option<u64>,
  pub results:  Vec<T>,
}

impl<T> Page<T> {
  pub fn new(results: Vec<T>, count: u64, req: PageRequest) -> Self {
    let end = req.offset().saturating_add(results.len() as u64);
    Self {
      count,
      next: req.page.checked_add(1).filter(|_| end < count),
      previous: (req.page > 1).then_some(req.page - 1),
      results,
    }
  }

  /// A page past the end of a non-empty listing. The first page is always
  /// in range, even when empty.
  pub fn is_out_of_range(&self, req: PageRequest) -> bool {
    req.page > 1 && self.results.is_empty()
  }

  pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
    Page {
      count:    self.count,
      next:     self.next,
      previous: self.previous,
      results:  self.results.into_iter().map(f).collect(),
    }
  }
}
