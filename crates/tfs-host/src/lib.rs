//! FUSE adapter and mount daemon exposing the `tfs-fs` engine through
//! `fuser`. This crate owns no on-disk layout of its own, only the
//! translation from kernel VFS calls to the engine's operation surface and
//! the error-kind-to-errno mapping.

pub mod adapter;
pub mod errno;

pub use adapter::TfsFuse;
