//! File-output mode for page results, plus optional markdown rendering.

pub mod json_saver;
pub mod markdown;

pub use json_saver::save_page_result;
