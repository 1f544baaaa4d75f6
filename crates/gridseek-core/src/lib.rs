#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod data_processor;
pub mod error;
pub mod predicate;
pub mod render;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use predicate::{Condition, NumericRange, Predicate};
pub use traits::{Embedder, RecordSource};
pub use types::{AttrValue, Attributes, RecordId, RetrievalResult, SourceRecord};
