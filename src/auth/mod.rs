//! Credential loading for subscription full-text access.
//!
//! The only credential the grabber knows about is the Crossref click-through
//! token, forwarded verbatim as a request header on Crossref full-text links.

mod token;

pub use token::{
    CLICK_THROUGH_HEADER, ClickThroughToken, CredentialError, load_click_through_token,
};
