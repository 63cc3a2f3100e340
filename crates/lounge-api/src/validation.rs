//! Field rules applied before any mutation.
//!
//! Every check runs to completion and records its problem against the field
//! name, so a caller sees all of them at once rather than one per round trip.
//! Uniqueness is not checked here; it needs the store and lives in
//! [`crate::credentials`].

use std::collections::BTreeMap;

use lounge_types::api::{CreateMessageRequest, LoginRequest, RegisterRequest, UpdateProfileRequest};

use crate::error::ApiError;

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 150;
pub const PASSWORD_MIN: usize = 8;
pub const PASSWORD_MAX: usize = 128;
pub const EMAIL_MAX: usize = 254;
pub const MESSAGE_MAX: usize = 5000;

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";
const BAD_EMAIL: &str = "Enter a valid email address.";

/// Problems keyed by field name, in stable order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, msg: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(msg.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn into_map(self) -> BTreeMap<String, Vec<String>> {
        self.0
    }

    /// `Ok` when nothing was recorded, otherwise [`ApiError::InvalidField`].
    pub fn finish(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::InvalidField(self))
        }
    }
}

/// A registration that passed every format rule.
#[cfg_attr(test, derive(Debug))]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Format-pass outcome for a registration. A field is `Some` only if it
/// passed its own rules; every failure is recorded in `errors`.
#[derive(Default)]
pub struct RegistrationCheck {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub errors: FieldErrors,
}

impl RegistrationCheck {
    /// Fails with every recorded problem, including any the caller added
    /// after the format pass.
    pub fn finish(self) -> Result<Registration, ApiError> {
        self.errors.finish()?;
        match (self.username, self.email, self.password) {
            (Some(username), Some(email), Some(password)) => Ok(Registration {
                username,
                email,
                password,
            }),
            _ => Err(ApiError::InvalidField(FieldErrors::default())),
        }
    }
}

pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Fields to overwrite on a profile; `None` means leave as is.
#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub email: Option<String>,
}

/// Format-pass outcome for a profile edit. Omitted fields and fields that
/// broke a rule are both `None`; only the latter leave an entry in `errors`.
#[derive(Debug, Default)]
pub struct ProfileCheck {
    pub username: Option<String>,
    pub email: Option<String>,
    pub errors: FieldErrors,
}

impl ProfileCheck {
    pub fn finish(self) -> Result<ProfileChanges, ApiError> {
        self.errors.finish()?;
        Ok(ProfileChanges {
            username: self.username,
            email: self.email,
        })
    }
}

pub fn check_registration(req: RegisterRequest) -> RegistrationCheck {
    let mut errors = FieldErrors::default();

    let username = required_text(&mut errors, "username", req.username)
        .filter(|username| check_username(&mut errors, username));

    let email = required_text(&mut errors, "email", req.email)
        .filter(|email| check_email(&mut errors, email));

    // Passwords are taken verbatim; surrounding spaces are part of the secret.
    let password = match req.password {
        None => {
            errors.add("password", REQUIRED);
            None
        }
        Some(p) if p.is_empty() => {
            errors.add("password", BLANK);
            None
        }
        Some(p) => check_password(&mut errors, &p).then_some(p),
    };

    RegistrationCheck {
        username,
        email,
        password,
        errors,
    }
}

pub fn validate_login(req: LoginRequest) -> Result<Credentials, ApiError> {
    let mut errors = FieldErrors::default();

    let email = required_text(&mut errors, "email", req.email);
    if let Some(ref email) = email {
        check_email(&mut errors, email);
    }

    let password = match req.password {
        Some(p) if !p.is_empty() => Some(p),
        Some(_) => {
            errors.add("password", BLANK);
            None
        }
        None => {
            errors.add("password", REQUIRED);
            None
        }
    };

    errors.finish()?;
    match (email, password) {
        (Some(email), Some(password)) => Ok(Credentials { email, password }),
        _ => Err(ApiError::InvalidField(FieldErrors::default())),
    }
}

pub fn check_profile_update(req: UpdateProfileRequest) -> ProfileCheck {
    let mut errors = FieldErrors::default();

    let username = req.username.map(|raw| raw.trim().to_string()).filter(|username| {
        if username.is_empty() {
            errors.add("username", BLANK);
            false
        } else {
            check_username(&mut errors, username)
        }
    });

    let email = req.email.map(|raw| raw.trim().to_string()).filter(|email| {
        if email.is_empty() {
            errors.add("email", BLANK);
            false
        } else {
            check_email(&mut errors, email)
        }
    });

    ProfileCheck {
        username,
        email,
        errors,
    }
}

/// Returns the trimmed text to store.
pub fn validate_message(req: CreateMessageRequest) -> Result<String, ApiError> {
    let mut errors = FieldErrors::default();

    let text = required_text(&mut errors, "text", req.text);
    if let Some(ref text) = text {
        let len = text.chars().count();
        if len > MESSAGE_MAX {
            errors.add(
                "text",
                format!("Ensure this field has no more than {} characters.", MESSAGE_MAX),
            );
        }
    }

    errors.finish()?;
    text.ok_or_else(|| ApiError::InvalidField(FieldErrors::default()))
}

/// Trims and records "required" / "blank" problems. Returns the trimmed value
/// only if it is present and non-empty.
fn required_text(errors: &mut FieldErrors, field: &str, value: Option<String>) -> Option<String> {
    match value {
        None => {
            errors.add(field, REQUIRED);
            None
        }
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                errors.add(field, BLANK);
                None
            } else {
                Some(trimmed.to_string())
            }
        }
    }
}

// The check_* helpers return whether the value passed.

fn check_username(errors: &mut FieldErrors, username: &str) -> bool {
    let len = username.chars().count();
    if len < USERNAME_MIN {
        errors.add(
            "username",
            format!("Ensure this field has at least {} characters.", USERNAME_MIN),
        );
        false
    } else if len > USERNAME_MAX {
        errors.add(
            "username",
            format!("Ensure this field has no more than {} characters.", USERNAME_MAX),
        );
        false
    } else {
        true
    }
}

fn check_email(errors: &mut FieldErrors, email: &str) -> bool {
    let ok = is_valid_email(email);
    if !ok {
        errors.add("email", BAD_EMAIL);
    }
    ok
}

fn check_password(errors: &mut FieldErrors, password: &str) -> bool {
    let len = password.chars().count();
    if len < PASSWORD_MIN {
        errors.add(
            "password",
            format!("Ensure this field has at least {} characters.", PASSWORD_MIN),
        );
        false
    } else if len > PASSWORD_MAX {
        errors.add(
            "password",
            format!("Ensure this field has no more than {} characters.", PASSWORD_MAX),
        );
        false
    } else {
        true
    }
}

/// Structural email check: `local@domain.tld`, no whitespace, at most
/// [`EMAIL_MAX`] bytes, domain labels non-empty and not starting or ending
/// with a hyphen.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > EMAIL_MAX || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || local.len() > 64 || domain.contains('@') {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    labels.iter().all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_alphanumeric() || c == '-')
    })
}
