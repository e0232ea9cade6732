//! Launch-to-account resolution.
//!
//! [`AccountResolver::resolve_account`] finds or creates the account named by
//! a launch, refreshes its profile, enrolls it in the target collection when
//! [`AccountResolver::subscription_policy`] allows, and only then swaps the
//! session. A store failure therefore never leaves a half-switched session.

use crate::capability::{Capability, SiteRole};
use crate::error::BridgeResult;
use crate::model::{Account, AccountId, CollectionId, EnrollmentRecord, LaunchContext, NewAccount};
use crate::roles::{highest_role, parse_roles};
use crate::session::SessionStore;
use crate::store::{AccountStore, SETTING_TEACHERS_ONLY};
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of generated account passwords.
pub const PASSWORD_LEN: usize = 32;

/// What one resolve call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The launch carried no login.
    Skipped,
    Resolved {
        account: AccountId,
        created: bool,
        enrolled: bool,
        session_started: bool,
    },
}

impl ResolveOutcome {
    pub fn account(&self) -> Option<AccountId> {
        match self {
            Self::Skipped => None,
            Self::Resolved { account, .. } => Some(*account),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AccountResolver<S> {
    store: S,
    primary: CollectionId,
    email_domain: String,
}

impl<S: AccountStore> AccountResolver<S> {
    pub fn new(store: S, primary: CollectionId, email_domain: impl Into<String>) -> Self {
        Self {
            store,
            primary,
            email_domain: email_domain.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn primary_collection(&self) -> CollectionId {
        self.primary
    }

    pub fn default_email(&self, login: &str) -> String {
        default_email(login, &self.email_domain)
    }

    pub fn resolve_account(
        &self,
        ctx: &LaunchContext,
        session: &mut impl SessionStore,
    ) -> BridgeResult<ResolveOutcome> {
        if !ctx.has_login() {
            tracing::debug!(event = "resolve_skipped", reason = "no login");
            return Ok(ResolveOutcome::Skipped);
        }

        let (account, created) = self.find_or_create(ctx)?;
        self.update_profile(&account, ctx)?;
        let enrolled = self.enroll_if_allowed(account.id, ctx)?;

        let session_started = match session.current_session() {
            Some(current) if current == account.id => false,
            Some(current) => {
                tracing::info!(
                    event = "session_ended",
                    previous = %current,
                    login = %account.login
                );
                session.end_session();
                session.start_session(account.id);
                true
            }
            None => {
                session.start_session(account.id);
                true
            }
        };
        if session_started {
            tracing::info!(event = "session_started", account = %account.id);
        }

        Ok(ResolveOutcome::Resolved {
            account: account.id,
            created,
            enrolled,
            session_started,
        })
    }

    fn find_or_create(&self, ctx: &LaunchContext) -> BridgeResult<(Account, bool)> {
        if let Some(existing) = self.store.find_account_by_login(&ctx.login)? {
            return Ok((existing, false));
        }

        let email = match &ctx.email {
            Some(email) => email.clone(),
            None => self.default_email(&ctx.login),
        };
        let password = generate_password();
        let digest = hex::encode(Sha256::digest(password.as_bytes()));
        let (account, created) = self.store.create_account(
            &NewAccount {
                login: &ctx.login,
                email: &email,
                password_digest: &digest,
            },
            (self.primary, SiteRole::Subscriber),
        )?;
        if created {
            tracing::info!(event = "account_created", login = %account.login, account = %account.id);
        }
        Ok((account, created))
    }

    /// Overwrite both name fields when the launch supplies either one.
    pub fn update_profile(&self, account: &Account, ctx: &LaunchContext) -> BridgeResult<bool> {
        if !ctx.has_name() {
            return Ok(false);
        }
        let first = ctx.given_name.as_deref().unwrap_or_default();
        let last = ctx.family_name.as_deref().unwrap_or_default();
        if account.first_name == first && account.last_name == last {
            return Ok(false);
        }
        self.store.update_names(account.id, first, last)?;
        tracing::debug!(event = "profile_updated", account = %account.id);
        Ok(true)
    }

    fn enroll_if_allowed(&self, account: AccountId, ctx: &LaunchContext) -> BridgeResult<bool> {
        let Some(target) = ctx.target_collection else {
            return Ok(false);
        };
        if self.store.is_member(account, target)? {
            return Ok(false);
        }
        if !self.subscription_policy(ctx)? {
            tracing::info!(
                event = "enrollment_refused",
                account = %account,
                collection = %target,
                reason = "teachers_only"
            );
            return Ok(false);
        }

        let record = EnrollmentRecord::from_launch(ctx, parse_roles(ctx), Utc::now());
        let enrolled = self
            .store
            .enroll(account, target, SiteRole::Subscriber, &record)?;
        if enrolled {
            tracing::info!(event = "membership_added", account = %account, collection = %target);
        }
        Ok(enrolled)
    }

    /// Whether the launching user may self-enroll in the launch's target
    /// collection (the primary collection when none is given).
    pub fn subscription_policy(&self, ctx: &LaunchContext) -> BridgeResult<bool> {
        if highest_role(&parse_roles(ctx)).is_privileged() {
            return Ok(true);
        }
        let collection = ctx.target_collection.unwrap_or(self.primary);
        let teachers_only = self.store.get_setting(collection, SETTING_TEACHERS_ONLY)?;
        Ok(!is_enabled(teachers_only.as_deref()))
    }
}

/// `<login>@<domain>`.
pub fn default_email(login: &str, domain: &str) -> String {
    format!("{login}@{domain}")
}

fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LEN)
        .map(char::from)
        .collect()
}

fn is_enabled(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1") | Some("true")
    )
}

/// Session is active and its account holds [`Capability::ManageLinks`] in
/// `collection`.
pub fn can_manage_links<S: AccountStore + ?Sized>(
    store: &S,
    session: &impl SessionStore,
    collection: CollectionId,
) -> BridgeResult<bool> {
    match session.current_session() {
        Some(account) => store.has_capability(account, collection, Capability::ManageLinks),
        None => Ok(false),
    }
}
