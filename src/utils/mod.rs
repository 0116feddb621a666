pub mod errors;

pub use errors::extract_clean_error;
