use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use schemars::JsonSchema;
use std::borrow::Cow;
use std::fmt;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

#[derive(Serialize, Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct BrowserSession {
    pub id: Uuid,
    pub email: String,
    pub browser_session_id: Option<String>,
    pub session_status: Option<String>,
    pub created_at: NaiveDate,
}

/// How a single record is addressed: by primary key or by its browser session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserSessionKey {
    Id(Uuid),
    BrowserSessionId(String),
}

impl BrowserSessionKey {
    pub fn matches(&self, session: &BrowserSession) -> bool {
        match self {
            BrowserSessionKey::Id(id) => session.id == *id,
            BrowserSessionKey::BrowserSessionId(value) => session.browser_session_id.as_deref() == Some(value.as_str()),
        }
    }
}

impl fmt::Display for BrowserSessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserSessionKey::Id(id) => write!(f, "id {}", id),
            BrowserSessionKey::BrowserSessionId(value) => write!(f, "browser_session_id '{}'", value),
        }
    }
}

/// Exact-match list filters. Empty strings count as "not supplied".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowserSessionFilter {
    pub browser_session_id: Option<String>,
    pub email: Option<String>,
}

impl BrowserSessionFilter {
    pub fn new(browser_session_id: Option<String>, email: Option<String>) -> Self {
        Self {
            browser_session_id: browser_session_id.filter(|v| !v.is_empty()),
            email: email.filter(|v| !v.is_empty()),
        }
    }

    pub fn matches(&self, session: &BrowserSession) -> bool {
        let id_matches = match &self.browser_session_id {
            Some(wanted) => session.browser_session_id.as_deref() == Some(wanted.as_str()),
            None => true,
        };
        let email_matches = match &self.email {
            Some(wanted) => session.email == *wanted,
            None => true,
        };
        id_matches && email_matches
    }
}

/// Which write a payload is destined for; decides which fields are mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadMode {
    Create,
    Replace,
    Partial,
}

impl PayloadMode {
    fn requires_email(self) -> bool {
        !matches!(self, PayloadMode::Partial)
    }
}

/// Write payload for create, replace (PUT) and partial update (PATCH).
///
/// Each field is `None` when absent from the JSON body and `Some(None)` when
/// explicitly `null`, so a partial update can tell "leave alone" from "clear".
#[derive(Deserialize, Debug, Default, Clone, Validate, JsonSchema)]
pub struct BrowserSessionRequest {
    #[serde(default, deserialize_with = "present")]
    #[schemars(with = "Option<String>")]
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 600, message = "Ensure this field has no more than 600 characters.")
    )]
    pub email: Option<Option<String>>,

    #[serde(default, deserialize_with = "present")]
    #[schemars(with = "Option<String>")]
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub browser_session_id: Option<Option<String>>,

    #[serde(default, deserialize_with = "present")]
    #[schemars(with = "Option<String>")]
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub session_status: Option<Option<String>>,
}

/// Marks the field as present and strips surrounding whitespace from any string value.
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(Some(value.map(|v| v.trim().to_string())))
}

/// The `email` rule accepts dotless domains such as `a@b`; addresses here need a dotted domain.
fn has_dotted_domain(email: &str) -> bool {
    match email.rsplit_once('@') {
        Some((_, domain)) => domain.split('.').count() > 1 && domain.split('.').all(|label| !label.is_empty()),
        None => false,
    }
}

fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

impl BrowserSessionRequest {
    /// Runs the field validators plus the presence rules for `mode`.
    pub fn validate_for(&self, mode: PayloadMode) -> Result<(), ValidationErrors> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };

        match &self.email {
            Some(Some(email)) if !errors.field_errors().contains_key("email") && !has_dotted_domain(email) => {
                errors.add("email", field_error("email", "Enter a valid email address."))
            }
            Some(None) => errors.add("email", field_error("null", "This field may not be null.")),
            None if mode.requires_email() => errors.add("email", field_error("required", "This field is required.")),
            _ => {}
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Email to store on create. Only meaningful after `validate_for(PayloadMode::Create)`.
    pub fn email_value(&self) -> &str {
        self.email.as_ref().and_then(|e| e.as_deref()).unwrap_or_default()
    }

    pub fn browser_session_id_value(&self) -> Option<&str> {
        self.browser_session_id.as_ref().and_then(|v| v.as_deref())
    }

    pub fn session_status_value(&self) -> Option<&str> {
        self.session_status.as_ref().and_then(|v| v.as_deref())
    }

    /// Copies every field present in the payload onto `session`. `created_at` and `id` are untouched.
    pub fn apply_to(&self, session: &mut BrowserSession) {
        if let Some(Some(email)) = &self.email {
            session.email = email.clone();
        }
        if let Some(browser_session_id) = &self.browser_session_id {
            session.browser_session_id = browser_session_id.clone();
        }
        if let Some(session_status) = &self.session_status {
            session.session_status = session_status.clone();
        }
    }
}

#[derive(Serialize, Debug, Clone, JsonSchema)]
pub struct BrowserSessionResponse {
    pub id: Uuid,
    pub browser_session_id: Option<String>,
    pub email: String,
    pub created_at: NaiveDate,
    pub session_status: Option<String>,
}

impl From<&BrowserSession> for BrowserSessionResponse {
    fn from(session: &BrowserSession) -> Self {
        Self {
            id: session.id,
            browser_session_id: session.browser_session_id.clone(),
            email: session.email.clone(),
            created_at: session.created_at,
            session_status: session.session_status.clone(),
        }
    }
}
