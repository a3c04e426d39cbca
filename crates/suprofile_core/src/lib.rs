pub mod error;
pub mod profile;
pub mod store;
pub mod editor;
pub mod template;
pub mod sepolicy;

pub mod config;
pub mod constants;

pub use error::{ProfileError, Result};
pub use profile::{Mode, Namespace, NonRootProfile, Profile, RootProfile, TemplateRef};
pub use store::{FileStore, MemoryStore, ProfileStore, is_valid_package_name};
pub use editor::{ProfileEditor, su_allowed_for_uid};
pub use template::{Template, TemplateRepository};
pub use config::Config;
