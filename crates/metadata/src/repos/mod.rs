//! Repository traits for catalog operations.

pub mod activity;
pub mod groups;
pub mod platform_mirrors;
pub mod resource_limits;
pub mod transaction;
pub mod version_mirrors;

pub use activity::ActivityRepo;
pub use groups::GroupRepo;
pub use platform_mirrors::PlatformMirrorRepo;
pub use resource_limits::ResourceLimitRepo;
pub use transaction::MirrorTransaction;
pub use version_mirrors::VersionMirrorRepo;
