//! State shared by every subcommand of one invocation.

use anyhow::bail;
use tracing::warn;

use stayhub_client::{ApiClient, ApiError};
use stayhub_core::models::User;
use stayhub_core::{Config, Session};

/// Resolved configuration plus the injected session.
#[derive(Debug)]
pub struct CliContext {
    pub config: Config,
    pub session: Session,
}

impl CliContext {
    pub const fn new(config: Config, session: Session) -> Self {
        Self { config, session }
    }

    /// REST client carrying the session token, if any.
    pub fn api(&self) -> anyhow::Result<ApiClient> {
        let mut api = ApiClient::from_config(&self.config.api)?;
        api.set_token(self.session.token().map(str::to_string));
        Ok(api)
    }

    pub fn require_user(&self) -> anyhow::Result<User> {
        match self.session.current() {
            Some(user) => Ok(user.clone()),
            None => bail!("Not logged in. Run `stayhub auth login` first"),
        }
    }

    /// Unwrap an API result. A rejected token ends the session.
    pub fn check<T>(&mut self, result: Result<T, ApiError>) -> anyhow::Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(ApiError::Unauthorized) => {
                if let Err(e) = self.session.logout() {
                    warn!(error = %e, "Failed to clear session");
                }
                bail!("Session expired. Run `stayhub auth login` again")
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use stayhub_core::models::RoleType;

    fn user() -> User {
        User {
            id: 4,
            first_name: Some("Ada".into()),
            last_name: None,
            email: "ada@example.com".into(),
            phone_number: None,
            profile_image: None,
            description: None,
            role_type: RoleType::Guest,
            token: Some("tok".into()),
        }
    }

    fn context(dir: &std::path::Path) -> CliContext {
        CliContext::new(Config::default(), Session::new(dir.join("session.json")))
    }

    #[test]
    fn unauthorized_clears_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path());
        ctx.session.login(user()).unwrap();
        assert!(ctx.session.path().exists());

        let err = ctx.check::<()>(Err(ApiError::Unauthorized)).unwrap_err();
        assert!(err.to_string().contains("Session expired"));
        assert!(!ctx.session.is_authenticated());
        assert!(!ctx.session.path().exists());
    }

    #[test]
    fn other_errors_keep_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path());
        ctx.session.login(user()).unwrap();

        let err = ctx
            .check::<()>(Err(ApiError::Rejected {
                code: 500,
                message: "boom".into(),
            }))
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert!(ctx.session.is_authenticated());
    }

    #[test]
    fn require_user_needs_a_login() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        assert!(ctx.require_user().is_err());
    }
}
