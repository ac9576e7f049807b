//! # folio-client
//!
//! Reader-side view reporting for Folio pages: a [`ViewReporter`] waits for
//! the dwell delay before sending a view through a [`ViewSink`], normally the
//! [`HttpViewSink`] that posts to `/api/views/{slug}`.

pub mod error;
pub mod reporter;
pub mod sink;

pub use error::ClientError;
pub use reporter::ViewReporter;
pub use sink::{HttpViewSink, ViewReceipt, ViewSink};
