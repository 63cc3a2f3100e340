//! Member accounts: registration, password checks, profile edits.
//!
//! Everything here is synchronous and talks to SQLite directly; handlers call
//! it from `spawn_blocking`.

use std::sync::LazyLock;

use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::{SubsecRound, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use lounge_db::Database;
use lounge_db::models::{MemberRow, format_timestamp, parse_timestamp};
use lounge_types::api::{RegisterRequest, UpdateProfileRequest};
use lounge_types::models::Member;

use crate::error::{ApiError, duplicate_message};
use crate::validation::{
    Credentials, FieldErrors, ProfileChanges, Registration, check_profile_update,
    check_registration,
};

/// Verified against when the email is unknown, so both login failure paths
/// cost one Argon2 run.
static DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password("lounge-timing-placeholder").unwrap_or_default());

/// Argon2id with a fresh random salt, encoded as a PHC string.
pub fn hash_password(raw: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(raw.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("Password hashing failed: {}", e))
}

pub fn verify_password(stored: &str, raw: &str) -> bool {
    let parsed = match PasswordHash::new(stored) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Unparseable password hash: {}", e);
            return false;
        }
    };
    Argon2::default()
        .verify_password(raw.as_bytes(), &parsed)
        .is_ok()
}

/// Format rules and uniqueness in one pass: a taken username is reported in
/// the same response as a short password.
pub fn validate_registration(db: &Database, req: RegisterRequest) -> Result<Registration, ApiError> {
    let mut check = check_registration(req);

    let mut duplicates = Vec::new();
    if let Some(ref username) = check.username {
        if db.username_taken(username, None)? {
            duplicates.push("username");
        }
    }
    if let Some(ref email) = check.email {
        if db.email_taken(email, None)? {
            duplicates.push("email");
        }
    }

    merge_duplicates(&mut check.errors, duplicates)?;
    check.finish()
}

/// Store a validated registration. Two registrations racing past
/// [`validate_registration`] are settled by the UNIQUE constraints; the loser
/// gets [`ApiError::DuplicateField`].
pub fn register(db: &Database, reg: Registration) -> Result<Member, ApiError> {
    let password_hash = hash_password(&reg.password)?;
    let id = Uuid::new_v4();
    let created_at = Utc::now().trunc_subsecs(6);

    db.create_member(
        &id.to_string(),
        &reg.username,
        &reg.email,
        &password_hash,
        &format_timestamp(created_at),
    )?;

    info!(member_id = %id, "Member registered");
    Ok(Member {
        id,
        username: reg.username,
        email: reg.email,
        created_at,
    })
}

/// Unknown email and wrong password both yield [`ApiError::InvalidCredentials`].
pub fn authenticate(db: &Database, creds: Credentials) -> Result<Member, ApiError> {
    let Some(row) = db.get_member_by_email(&creds.email)? else {
        verify_password(&DUMMY_HASH, &creds.password);
        return Err(ApiError::InvalidCredentials);
    };

    if !verify_password(&row.password_hash, &creds.password) {
        return Err(ApiError::InvalidCredentials);
    }

    Ok(member_from_row(row))
}

/// Profile counterpart of [`validate_registration`]. Values the member
/// already holds do not count as taken.
pub fn validate_profile_update(
    db: &Database,
    member_id: Uuid,
    req: UpdateProfileRequest,
) -> Result<ProfileChanges, ApiError> {
    let mut check = check_profile_update(req);
    let id = member_id.to_string();

    let mut duplicates = Vec::new();
    if let Some(ref username) = check.username {
        if db.username_taken(username, Some(id.as_str()))? {
            duplicates.push("username");
        }
    }
    if let Some(ref email) = check.email {
        if db.email_taken(email, Some(id.as_str()))? {
            duplicates.push("email");
        }
    }

    merge_duplicates(&mut check.errors, duplicates)?;
    check.finish()
}

pub fn update_profile(
    db: &Database,
    member_id: Uuid,
    changes: ProfileChanges,
) -> Result<Member, ApiError> {
    let id = member_id.to_string();
    let row = db
        .update_member(&id, changes.username.as_deref(), changes.email.as_deref())?
        .ok_or(ApiError::NotFound)?;

    info!(member_id = %member_id, "Profile updated");
    Ok(member_from_row(row))
}

/// With no format problems the hits are a plain [`ApiError::DuplicateField`];
/// otherwise they join the per-field report.
fn merge_duplicates(errors: &mut FieldErrors, duplicates: Vec<&str>) -> Result<(), ApiError> {
    if duplicates.is_empty() {
        return Ok(());
    }
    if errors.is_empty() {
        return Err(ApiError::DuplicateField(
            duplicates.into_iter().map(String::from).collect(),
        ));
    }
    for field in duplicates {
        errors.add(field, duplicate_message(field));
    }
    Ok(())
}

pub(crate) fn member_from_row(row: MemberRow) -> Member {
    Member {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt member id '{}': {}", row.id, e);
            Uuid::default()
        }),
        created_at: parse_timestamp(&row.created_at).unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on member '{}': {}", row.created_at, row.id, e);
            chrono::DateTime::default()
        }),
        username: row.username,
        email: row.email,
    }
}
