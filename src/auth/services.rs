use std::sync::Arc;

use anyhow::Context;
use base64ct::{Base64UrlUnpadded, Encoding};
use lazy_static::lazy_static;
use rand::{rngs::OsRng, seq::SliceRandom, RngCore};
use regex::Regex;
use time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        password::{
            check_length, hash_password, to_hex, unusable_hash, verify_dummy, verify_password,
        },
        repo::AuthRepo,
        repo_types::{NewUser, SessionUser, User},
    },
    clock::Clock,
    config::SessionConfig,
    error::{AppError, AppResult},
};

const TOKEN_BYTES: usize = 32;
const GUEST_DOMAIN: &str = "touchgrass.temp";
const GUEST_NAMES: &[&str] = &[
    "Anonymous Explorer",
    "Mystery Hiker",
    "Secret Naturalist",
    "Hidden Wanderer",
    "Unknown Adventurer",
    "Stealth Walker",
    "Phantom Hunter",
    "Shadow Seeker",
];

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// 32 random bytes from the OS, unpadded base64url.
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

/// A user together with the session just opened for them.
#[derive(Debug, Clone)]
pub struct Issued {
    pub user: User,
    pub token: String,
}

#[derive(Clone)]
pub struct AuthService {
    repo: Arc<dyn AuthRepo>,
    clock: Arc<dyn Clock>,
    session_ttl: Duration,
    guest_ttl: Duration,
}

impl AuthService {
    pub fn new(repo: Arc<dyn AuthRepo>, clock: Arc<dyn Clock>, cfg: &SessionConfig) -> Self {
        Self {
            repo,
            clock,
            session_ttl: Duration::days(cfg.ttl_days),
            guest_ttl: Duration::hours(cfg.guest_ttl_hours),
        }
    }

    pub async fn signup(&self, email: &str, password: &str, display_name: &str) -> AppResult<Issued> {
        let email = email.trim().to_lowercase();
        let display_name = display_name.trim();

        if email.is_empty() || password.is_empty() || display_name.is_empty() {
            return Err(AppError::bad_request(
                "Email, password, and display name are required",
            ));
        }
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(AppError::bad_request("Invalid email format"));
        }
        check_length(password).map_err(AppError::bad_request)?;

        if self.repo.find_user_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AppError::Conflict("User with this email already exists".into()));
        }

        let user = self
            .repo
            .create_user(NewUser {
                email: email.clone(),
                password_hash: hash_password(password)?,
                display_name: display_name.to_string(),
                is_guest: false,
            })
            .await?
            .ok_or_else(|| AppError::Conflict("Email already exists".into()))?;

        let token = self.open_session(user.id, self.session_ttl).await?;
        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(Issued { user, token })
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<Issued> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || password.is_empty() {
            return Err(AppError::bad_request("Email and password are required"));
        }

        let invalid = || AppError::unauthorized("Invalid email or password");
        let user = match self.repo.find_user_by_email(&email).await? {
            Some(u) => u,
            None => {
                verify_dummy(password);
                warn!(email = %email, "login unknown email");
                return Err(invalid());
            }
        };
        if user.is_guest {
            verify_dummy(password);
            warn!(user_id = %user.id, "password login attempted on guest account");
            return Err(invalid());
        }
        if !verify_password(password, &user.password_hash)? {
            warn!(email = %email, user_id = %user.id, "login invalid password");
            return Err(invalid());
        }

        let now = self.clock.now();
        self.repo
            .touch_last_login(user.id, now)
            .await
            .context("update last_login")?;
        let token = self.open_session(user.id, self.session_ttl).await?;

        self.cleanup_expired().await;
        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok(Issued { user, token })
    }

    pub async fn create_guest(&self) -> AppResult<Issued> {
        let mut id_bytes = [0u8; 8];
        OsRng.fill_bytes(&mut id_bytes);
        let guest_id = to_hex(&id_bytes);

        let name = GUEST_NAMES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("Guest");
        let display_name = format!("{name} #{}", &guest_id[guest_id.len() - 4..]);

        let user = self
            .repo
            .create_user(NewUser {
                email: format!("guest_{guest_id}@{GUEST_DOMAIN}"),
                password_hash: unusable_hash()?,
                display_name,
                is_guest: true,
            })
            .await?
            .ok_or_else(|| anyhow::anyhow!("guest email collision"))?;

        let token = self.open_session(user.id, self.guest_ttl).await?;
        info!(user_id = %user.id, display_name = %user.display_name, "guest created");
        Ok(Issued { user, token })
    }

    /// Removing an unknown token is fine; a missing one is not.
    pub async fn logout(&self, token: Option<&str>) -> AppResult<()> {
        let token = token.ok_or_else(|| AppError::bad_request("Session token required"))?;
        let removed = self.repo.delete_session(token).await?;
        debug!(removed, "session deleted");
        Ok(())
    }

    /// Fails closed: any problem resolving the token yields `None`.
    pub async fn verify(&self, token: Option<&str>) -> Option<SessionUser> {
        let token = token.filter(|t| !t.is_empty())?;
        match self.repo.find_live_session(token, self.clock.now()).await {
            Ok(found) => found,
            Err(e) => {
                error!(error = %e, "session lookup failed");
                None
            }
        }
    }

    /// Sweep sessions past their expiry. Errors are logged, not returned.
    pub async fn cleanup_expired(&self) -> u64 {
        match self.repo.delete_expired_sessions(self.clock.now()).await {
            Ok(n) => {
                if n > 0 {
                    info!(deleted = n, "cleaned up expired sessions");
                }
                n
            }
            Err(e) => {
                error!(error = %e, "cleanup of expired sessions failed");
                0
            }
        }
    }

    pub async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.repo.find_user_by_id(id).await?)
    }

    pub async fn update_display_name(&self, email: &str, display_name: &str) -> AppResult<()> {
        let email = email.trim().to_lowercase();
        let display_name = display_name.trim();
        if email.is_empty() || display_name.is_empty() {
            return Err(AppError::bad_request("Email and display name are required"));
        }
        if self.repo.update_display_name(&email, display_name).await? == 0 {
            return Err(AppError::NotFound("User not found".into()));
        }
        info!(email = %email, display_name, "display name updated");
        Ok(())
    }

    async fn open_session(&self, user_id: Uuid, ttl: Duration) -> anyhow::Result<String> {
        let token = generate_session_token();
        let expires_at = self.clock.now() + ttl;
        self.repo
            .insert_session(user_id, &token, expires_at)
            .await
            .context("insert session")?;
        debug!(user_id = %user_id, %expires_at, "session opened");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::manual::ManualClock;
    use crate::memory::MemoryStore;

    fn service() -> (AuthService, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::default());
        let clock = Arc::new(ManualClock::new());
        let cfg = SessionConfig {
            ttl_days: 7,
            guest_ttl_hours: 24,
        };
        let svc = AuthService::new(store.clone(), clock.clone(), &cfg);
        (svc, store, clock)
    }

    #[test]
    fn email_pattern() {
        assert!(is_valid_email("hiker@trail.org"));
        assert!(is_valid_email("first.last+tag@mail.example.co"));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("user@host"));
        assert!(!is_valid_email("user@host.c"));
        assert!(!is_valid_email("spaces in@mail.com"));
    }

    #[test]
    fn session_tokens_are_url_safe_and_unique() {
        let a = generate_session_token();
        let b = generate_session_token();
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[tokio::test]
    async fn signup_session_lives_seven_days() {
        let (svc, _, clock) = service();
        let issued = svc
            .signup(" Walker@Example.com ", "long-enough", "Walker")
            .await
            .unwrap();
        assert_eq!(issued.user.email, "walker@example.com");

        let who = svc.verify(Some(&issued.token)).await.unwrap();
        assert_eq!(who.user_id, issued.user.id);

        clock.advance(Duration::days(7) - Duration::seconds(1));
        assert!(svc.verify(Some(&issued.token)).await.is_some());

        clock.advance(Duration::seconds(1));
        assert!(svc.verify(Some(&issued.token)).await.is_none());
    }

    #[tokio::test]
    async fn signup_validation() {
        let (svc, _, _) = service();
        let err = svc.signup("bad-email", "long-enough", "x").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        let err = svc.signup("a@b.io", "short", "x").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        let err = svc.signup("a@b.io", "long-enough", "   ").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let (svc, _, _) = service();
        svc.signup("dup@example.com", "password1", "One").await.unwrap();
        let err = svc
            .signup("DUP@example.com", "password2", "Two")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized_and_opens_no_session() {
        let (svc, store, _) = service();
        let issued = svc.signup("p@example.com", "password1", "P").await.unwrap();
        assert_eq!(store.session_count(issued.user.id), 1);

        let err = svc.login("p@example.com", "password2").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert_eq!(store.session_count(issued.user.id), 1);

        let err = svc.login("nobody@example.com", "password1").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn login_keeps_other_sessions_alive() {
        let (svc, store, _) = service();
        let first = svc.signup("m@example.com", "password1", "M").await.unwrap();
        let second = svc.login("m@example.com", "password1").await.unwrap();

        assert_ne!(first.token, second.token);
        assert!(svc.verify(Some(&first.token)).await.is_some());
        assert!(svc.verify(Some(&second.token)).await.is_some());
        assert_eq!(store.session_count(first.user.id), 2);
    }

    #[tokio::test]
    async fn guest_session_is_short_and_password_login_fails() {
        let (svc, _, clock) = service();
        let guest = svc.create_guest().await.unwrap();
        assert!(guest.user.is_guest);
        assert!(guest.user.email.starts_with("guest_"));
        assert!(guest.user.email.ends_with("@touchgrass.temp"));
        assert!(guest.user.display_name.contains(" #"));

        assert!(svc.verify(Some(&guest.token)).await.is_some());

        let err = svc.login(&guest.user.email, "anything-at-all").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        clock.advance(Duration::hours(24));
        assert!(svc.verify(Some(&guest.token)).await.is_none());
    }

    #[tokio::test]
    async fn logout_revokes_only_that_token() {
        let (svc, _, _) = service();
        let a = svc.signup("l@example.com", "password1", "L").await.unwrap();
        let b = svc.login("l@example.com", "password1").await.unwrap();

        svc.logout(Some(&a.token)).await.unwrap();
        assert!(svc.verify(Some(&a.token)).await.is_none());
        assert!(svc.verify(Some(&b.token)).await.is_some());

        // already gone, still fine
        svc.logout(Some(&a.token)).await.unwrap();
        assert!(matches!(
            svc.logout(None).await.unwrap_err(),
            AppError::BadRequest(_)
        ));
    }

    #[tokio::test]
    async fn verify_fails_closed() {
        let (svc, _, _) = service();
        assert!(svc.verify(None).await.is_none());
        assert!(svc.verify(Some("")).await.is_none());
        assert!(svc.verify(Some("not-a-real-token")).await.is_none());
    }

    #[tokio::test]
    async fn cleanup_removes_only_expired() {
        let (svc, store, clock) = service();
        let guest = svc.create_guest().await.unwrap();
        let user = svc.signup("c@example.com", "password1", "C").await.unwrap();

        clock.advance(Duration::days(2));
        assert_eq!(svc.cleanup_expired().await, 1);
        assert_eq!(store.session_count(guest.user.id), 0);
        assert_eq!(store.session_count(user.user.id), 1);
    }

    #[tokio::test]
    async fn update_display_name_requires_known_user() {
        let (svc, store, _) = service();
        let issued = svc.signup("n@example.com", "password1", "Old").await.unwrap();

        svc.update_display_name("N@example.com", "New").await.unwrap();
        let user = store.user(issued.user.id).unwrap();
        assert_eq!(user.display_name, "New");

        assert!(matches!(
            svc.update_display_name("ghost@example.com", "X").await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            svc.update_display_name("n@example.com", " ").await.unwrap_err(),
            AppError::BadRequest(_)
        ));
    }
}
