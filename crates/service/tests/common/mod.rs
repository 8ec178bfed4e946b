//! Common test utilities and fixtures.

pub mod caller;
pub mod fixtures;
pub mod registry;
pub mod storage;

#[allow(unused_imports)]
pub use caller::*;
#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use registry::*;
#[allow(unused_imports)]
pub use storage::*;
