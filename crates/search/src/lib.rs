//! Wrangler search: sort/filter proxy views over read-models.

#![forbid(unsafe_code)]

pub mod alnum;
pub mod filter;
mod proxy;

pub use alnum::{compare, compare_cells};
pub use filter::WildcardFilter;
pub use proxy::{sort_alnum, SortFilterProxy, SortOrder};
