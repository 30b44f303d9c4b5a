pub mod commands;
pub mod config;
pub mod dedupe;
pub mod error;
pub mod http;
pub mod master_data;
pub mod runtime;

/// Shared helpers for unit tests.
#[cfg(test)]
pub mod test_utils {
    use crate::config::MEMBERS_TOKEN_VAR;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;

    /// Configure a mock runtime with common defaults for tests.
    /// - members API token absent
    pub fn configure_mock_runtime_basics(runtime: &mut MockRuntime) {
        runtime
            .expect_env_var()
            .with(eq(MEMBERS_TOKEN_VAR))
            .returning(|_| Err(std::env::VarError::NotPresent));
    }
}
