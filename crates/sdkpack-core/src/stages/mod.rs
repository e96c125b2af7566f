//! Pipeline stages.
//!
//! Each stage wraps one phase of the CI build and implements
//! [`crate::pipeline::Stage`]:
//!
//! | Stage | Tool | Policy |
//! |-------|------|--------|
//! | [`CheckoutStage`] | `git fetch` / `git checkout` | unchecked |
//! | [`SyncStage`] | `gclient sync` | fatal |
//! | [`PatchStage`] | `git am` | tolerated |
//! | [`ConfigureStage`] | filesystem | fatal |
//! | [`BuildStage`] | `gn gen`, `ninja`, test binaries | fatal |
//! | [`PackageStage`] | `git rev-parse`, filesystem, zip | fatal |

pub mod build;
pub mod checkout;
pub mod configure;
pub mod package;
pub mod patch;
pub mod sync;

pub use build::BuildStage;
pub use checkout::CheckoutStage;
pub use configure::{BUILDTOOLS_ENV, BUNDLED_ARGS_TEMPLATE, ConfigureStage};
pub use package::PackageStage;
pub use patch::PatchStage;
pub use sync::SyncStage;
