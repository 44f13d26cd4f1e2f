//! Account registration and referral linking.

use crate::config::LadderConfig;
use crate::error::{Error, Result};
use crate::models::{ReferralEdge, UserId, UserRecord};
use crate::store::RecordStore;
use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

/// Alphabet for referral codes.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of a referral code.
pub const CODE_LEN: usize = 8;

/// Sign-up form contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewMember {
    pub name: String,
    pub email: String,
    /// Code of the referring user, if the sign-up came through a referral link
    pub referral_code: Option<String>,
}

/// Result of a registration.
#[derive(Debug)]
pub struct Registration {
    pub user: UserRecord,
    /// The referrer the account was linked under. `Ok(None)` if no code was
    /// given or the code is unknown; `Err` if linking failed after the
    /// account was created.
    pub referrer: Result<Option<UserId>>,
}

/// Generate a random referral code.
pub fn generate_referral_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Normalize a user-entered referral code. Blank input means no code.
pub fn normalize_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_ascii_uppercase();
    (!code.is_empty()).then_some(code)
}

/// Create an account and, when a known referral code is given, link it
/// under the code's owner.
pub async fn register<S: RecordStore + ?Sized>(
    store: &S,
    config: &LadderConfig,
    member: &NewMember,
) -> Result<Registration> {
    let name = member.name.trim();
    let email = member.email.trim();
    if name.is_empty() || email.is_empty() {
        return Err(Error::InvalidInput("name and email are required".into()));
    }
    if !email.contains('@') {
        return Err(Error::InvalidInput(format!(
            "{:?} is not an email address",
            email
        )));
    }
    let referred_by = member.referral_code.as_deref().and_then(normalize_code);

    let user_id = Uuid::new_v4().to_string();
    let code = claim_code(store, config, &user_id).await?;

    let mut user = UserRecord::new(user_id, name.to_string(), email.to_string(), code);
    user.referred_by = referred_by.clone();
    if let Err(e) = store.create_user(&user).await {
        // The code was bound to an id that never became a user
        if let Err(release_err) = store
            .release_referral_code(&user.referral_code, &user.id)
            .await
        {
            warn!(
                user = %user.id,
                code = %user.referral_code,
                error = %release_err,
                "Referral code left bound to a failed registration"
            );
        }
        return Err(e);
    }
    info!(user = %user.id, code = %user.referral_code, "User registered");

    let referrer = match referred_by {
        Some(code) => link_referral(store, &user, &code).await,
        None => Ok(None),
    };
    Ok(Registration { user, referrer })
}

async fn claim_code<S: RecordStore + ?Sized>(
    store: &S,
    config: &LadderConfig,
    user_id: &str,
) -> Result<String> {
    for attempt in 1..=config.code_attempts {
        let code = generate_referral_code(&mut rand::thread_rng());
        if store.claim_referral_code(&code, user_id).await? {
            return Ok(code);
        }
        warn!(attempt, code = %code, "Referral code collision");
    }
    Err(Error::Conflict(format!(
        "no free referral code after {} attempts",
        config.code_attempts
    )))
}

async fn link_referral<S: RecordStore + ?Sized>(
    store: &S,
    user: &UserRecord,
    code: &str,
) -> Result<Option<UserId>> {
    let Some(referrer_id) = store.resolve_referral_code(code).await? else {
        warn!(user = %user.id, code, "Unknown referral code, account left unlinked");
        return Ok(None);
    };
    if referrer_id == user.id {
        return Ok(None);
    }

    let edge = ReferralEdge::snapshot(&referrer_id, user);
    let count = store.add_referral(&referrer_id, &edge).await?;
    info!(
        user = %user.id,
        referrer = %referrer_id,
        referrals = count,
        "Referral linked"
    );
    Ok(Some(referrer_id))
}
