// =============================================================================
// C1 — order book storage
// =============================================================================

mod side_book;
mod store;
mod types;

pub use side_book::SideBook;
pub use store::{Book, BookHealth, BookReading, BookStore};
pub use types::{BookKey, BookUpdate, PriceLevel, UpdateKind};
