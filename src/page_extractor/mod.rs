//! Per-page GEO/SEO signal extraction: raw DOM signals, content patterns,
//! schema.org parsing, and the final [`schema::PageResult`] record.

pub mod extractors;
pub mod js_scripts;
pub mod page_data;
pub mod patterns;
pub mod schema;

pub use page_data::{extract_page_result, PageInput};
pub use schema::PageResult;
