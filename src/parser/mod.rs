//! Input parsing for the wanted identifier list.
//!
//! The wanted list is a CSV file whose first row is a header naming a `PMID`
//! column; every following row carries one identifier.
//!
//! # Example
//!
//! ```
//! use grabber_core::parser::WantedSet;
//!
//! let set = WantedSet::from_ids(["12345", "67890", "12345"]).unwrap();
//! assert_eq!(set.len(), 2);
//! ```

mod error;
mod wanted;

pub use error::{PMID_HEADER, ParseError};
pub use wanted::{Pmid, WantedSet};
