//! Account lifecycle: signup, login, profile edits, password change and
//! reset, deletion.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::auth::{self, TokenSigner};
use crate::error::{Error, Result};
use crate::notifier::ResetMailer;
use crate::storage::{now_millis, Database, NewUser, ProfileUpdate, UserProfile, UserRecord};

/// Signup form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

/// Result of a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user_id: String,
}

#[derive(Clone)]
pub struct AccountService {
    db: Database,
    signer: TokenSigner,
    mailer: Arc<dyn ResetMailer>,
    reset_ttl_secs: i64,
}

impl AccountService {
    pub fn new(
        db: Database,
        signer: TokenSigner,
        mailer: Arc<dyn ResetMailer>,
        reset_ttl_secs: i64,
    ) -> Self {
        Self {
            db,
            signer,
            mailer,
            reset_ttl_secs,
        }
    }

    fn require_user(&self, user_id: &str) -> Result<UserRecord> {
        self.db.get_user(user_id)?.ok_or(Error::UserNotFound)
    }

    pub fn signup(&self, request: SignupRequest) -> Result<UserProfile> {
        let username = request.username.trim();
        let email = request.email.trim();
        let name = request.name.trim();
        if username.is_empty() || email.is_empty() || name.is_empty() {
            return Err(Error::InvalidInput(
                "Username, name, email and password are required".to_string(),
            ));
        }
        auth::validate_password(&request.password)?;

        let user = self.db.create_user(&NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: auth::hash_password(&request.password)?,
            name: name.to_string(),
            profile_picture: request.profile_picture.unwrap_or_default(),
        })?;

        tracing::info!(user_id = user.id.as_str(), username = username, "Account created");
        Ok(user.profile())
    }

    pub fn login(&self, username: &str, password: &str) -> Result<Session> {
        let user = self
            .db
            .get_user_by_username(username)?
            .ok_or(Error::InvalidCredentials)?;
        if !auth::verify_password(password, &user.password_hash)? {
            tracing::debug!(user_id = user.id.as_str(), "Login rejected");
            return Err(Error::InvalidCredentials);
        }

        Ok(Session {
            token: self.signer.issue(&user.id)?,
            user_id: user.id,
        })
    }

    /// Check a session token presented for `user_id`.
    pub fn authenticate(&self, user_id: &str, token: &str) -> Result<UserRecord> {
        if self.signer.verify(token)? != user_id {
            return Err(Error::InvalidToken);
        }
        self.require_user(user_id)
    }

    /// Profile as other users see it, without the email address.
    pub fn profile(&self, user_id: &str) -> Result<UserProfile> {
        let mut profile = self.require_user(user_id)?.profile();
        profile.email = None;
        Ok(profile)
    }

    pub fn edit_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<UserProfile> {
        if matches!(update.email.as_deref(), Some(email) if email.trim().is_empty()) {
            return Err(Error::InvalidInput("Email cannot be empty".to_string()));
        }
        if matches!(update.name.as_deref(), Some(name) if name.trim().is_empty()) {
            return Err(Error::InvalidInput("Name cannot be empty".to_string()));
        }

        let user = self
            .db
            .update_profile(user_id, update)?
            .ok_or(Error::UserNotFound)?;
        tracing::info!(user_id = user_id, "Profile updated");
        Ok(user.profile())
    }

    pub fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let user = self.require_user(user_id)?;
        if !auth::verify_password(current_password, &user.password_hash)? {
            return Err(Error::IncorrectPassword);
        }
        auth::validate_password(new_password)?;

        self.db
            .set_password_hash(user_id, &auth::hash_password(new_password)?)?;
        tracing::info!(user_id = user_id, "Password changed");
        Ok(())
    }

    /// Issue a reset token for the account with `email` and hand it to the
    /// mailer. The caller never sees the token.
    pub fn forgot_password(&self, email: &str) -> Result<()> {
        let user = self
            .db
            .get_user_by_email(email.trim())?
            .ok_or(Error::UserNotFound)?;

        let token = auth::generate_reset_token();
        let expires_at = now_millis() + self.reset_ttl_secs * 1000;
        self.db.set_reset_token(&user.id, &token, expires_at)?;
        self.mailer.send_reset_token(&user.email, &user.id, &token);

        tracing::info!(user_id = user.id.as_str(), "Password reset requested");
        Ok(())
    }

    pub fn reset_password(&self, token: &str, new_password: &str) -> Result<()> {
        let user = self
            .db
            .get_user_by_reset_token(token, now_millis())?
            .ok_or(Error::InvalidResetToken)?;
        auth::validate_password(new_password)?;

        self.db
            .set_password_hash(&user.id, &auth::hash_password(new_password)?)?;
        tracing::info!(user_id = user.id.as_str(), "Password reset");
        Ok(())
    }

    pub fn delete(&self, user_id: &str) -> Result<()> {
        if !self.db.delete_user(user_id)? {
            return Err(Error::UserNotFound);
        }
        tracing::info!(user_id = user_id, "Account deleted");
        Ok(())
    }

    /// Drop reset tokens past their expiry. Returns how many were cleared.
    pub fn purge_expired_reset_tokens(&self) -> Result<usize> {
        self.db.purge_expired_reset_tokens(now_millis())
    }
}
