//! Contract surface of the LSD wizard SDK.
//!
//! The SDK owns transaction construction, signing and submission. The dApp
//! only sequences calls against [`LsdWizard`] and interprets the results, so
//! everything here is an interface plus the small value types that cross it.

pub mod traits;

pub use traits::*;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockWizard, SdkCall};
