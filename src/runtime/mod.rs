//! Runtime abstraction for process-level operations.
//!
//! Environment lookups and input reading go through [`Runtime`] so commands
//! can be tested against a mock.
//!
//! - `env` - Environment variables
//! - `fs` - File and stdin input

mod env;
mod fs;

use anyhow::Result;
use std::env as std_env;
use std::path::Path;

#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    // Environment
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError>;

    // Input
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Read standard input until EOF.
    fn read_stdin(&self) -> Result<String>;
}

pub struct RealRuntime;

impl Runtime for RealRuntime {
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError> {
        self.env_var_impl(key)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.read_to_string_impl(path)
    }

    fn read_stdin(&self) -> Result<String> {
        self.read_stdin_impl()
    }
}
