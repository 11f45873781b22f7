//! SFTP delivery of exported files

pub mod uploader;

pub use uploader::{UploadSettings, Uploader};
