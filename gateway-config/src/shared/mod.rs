mod base;
mod kubernetes;
mod sentry;

pub use base::*;
pub use kubernetes::*;
pub use sentry::*;
