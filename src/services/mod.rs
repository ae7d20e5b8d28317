//! Business services. Each service owns a handle to the connection pool and is
//! shared across handlers behind an `Arc`.

pub mod carts;
pub mod catalog;
pub mod checkout;
pub mod customers;
pub mod orders;
pub mod reviews;
pub mod users;

use crate::PaginatedResponse;
use sea_orm::{ConnectionTrait, DbErr, PaginatorTrait, SelectorTrait};

pub use carts::CartService;
pub use catalog::CatalogService;
pub use checkout::CheckoutService;
pub use customers::CustomerService;
pub use orders::OrderService;
pub use reviews::ReviewService;
pub use users::UserService;

/// Largest row offset a page may start at; databases take OFFSET as a signed
/// 64-bit integer.
const MAX_OFFSET: u64 = i64::MAX as u64;

/// 1-based page selection, already clamped to the configured bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    pub fn new(page: Option<u64>, page_size: Option<u64>, default_size: u64, max_size: u64) -> Self {
        let page_size = page_size.unwrap_or(default_size).clamp(1, max_size.max(1));
        // Pages past the last addressable offset are empty anyway.
        let last_page = MAX_OFFSET / page_size;
        Self {
            page: page.unwrap_or(1).clamp(1, last_page),
            page_size,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
        }
    }
}

/// Runs `query` as a paginated select and wraps the result.
pub(crate) async fn fetch_page<'db, C, Q>(
    query: Q,
    conn: &'db C,
    page: PageRequest,
) -> Result<PaginatedResponse<<Q::Selector as SelectorTrait>::Item>, DbErr>
where
    C: ConnectionTrait,
    Q: PaginatorTrait<'db, C>,
{
    let paginator = query.paginate(conn, page.page_size);
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page.page - 1).await?;
    Ok(PaginatedResponse::new(items, total, page.page, page.page_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn missing_values_fall_back_to_defaults() {
        assert_eq!(
            PageRequest::new(None, None, 10, 100),
            PageRequest {
                page: 1,
                page_size: 10
            }
        );
    }

    #[test]
    fn huge_page_numbers_keep_the_offset_addressable() {
        let req = PageRequest::new(Some(u64::MAX), Some(100), 10, 100);
        assert_eq!(req.page_size, 100);
        assert!((req.page - 1) * req.page_size <= MAX_OFFSET);
    }

    proptest! {
        #[test]
        fn page_request_is_always_within_bounds(
            page in proptest::option::of(any::<u64>()),
            size in proptest::option::of(0u64..10_000),
            max in 1u64..500,
        ) {
            let req = PageRequest::new(page, size, 10.min(max), max);
            prop_assert!(req.page >= 1);
            prop_assert!(req.page.checked_mul(req.page_size).is_some());
            prop_assert!(req.page_size >= 1 && req.page_size <= max);
        }
    }
}
