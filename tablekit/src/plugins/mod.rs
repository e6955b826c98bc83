//! Reference plugins.
//!
//! Each plugin is a plain struct implementing [`Plugin`](crate::Plugin).
//! Construct it in an `Arc`, hand a clone to the table, and keep the other to
//! call its methods. Row and extension fields are published under the `pub
//! const` keys next to each plugin.

mod change;
mod check;
mod fetch;
mod filter;
mod hidden;
mod pagination;
mod row_set;
mod selection;
mod swap;

pub use change::{CHANGED_ROWS, RowChange};
pub use check::{CHECKED, CHECKED_ROWS, RowCheck};
pub use fetch::{
    Fetch, FetchError, FetchResponse, LAST_ERROR, LOADING, QUERY_PARAMS, QueryParam, QueryParams,
};
pub use filter::{CRITERIA, FILTERED_ROWS, Filter};
pub use hidden::{HAS_HIDDEN, HIDDEN, HIDDEN_ROWS, IS_ALL_HIDDEN, RowHidden};
pub use pagination::{PAGE, PAGE_SIZE, Pagination, TOTAL_ITEMS, TOTAL_PAGES};
pub use row_set::RowSet;
pub use selection::{HAS_SELECTED_ROWS, IS_ALL_SELECTED, RowSelection, SELECTED, SELECTED_ROWS};
pub use swap::{RowSwap, SWAPS};
