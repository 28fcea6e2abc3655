//! Tutorbot Core - shared configuration for all Tutorbot crates.
//!
//! - **config**: state, database and document directory layout
//! - **settings**: runtime tunables read from the environment

pub mod config;
pub mod settings;

pub use config::{
    config_dir, db_dir, documents_dir, ensure_all_dirs, env_file,
    feedback_dir, history_dir, invites_file, load_env, state_dir, users_dir,
};
pub use settings::{normalize_handle, Settings};
