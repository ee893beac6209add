//! Request bodies and the field rules applied before anything reaches a service.
//! Strings are trimmed first, then checked with `validator`.

use std::borrow::Cow;

use serde::Deserialize;
use tb_core::error::{AppError, Result};
use tb_core::models::{Category, Direction, PostSort};
use tb_services::{ListQuery, NewAccount, NewPost};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

fn handle_chars(handle: &str) -> std::result::Result<(), ValidationError> {
    if handle
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Ok(());
    }
    Err(rule(
        "handle_chars",
        "handle can only contain letters, numbers, hyphens and underscores",
    ))
}

fn secret_strength(secret: &str) -> std::result::Result<(), ValidationError> {
    let lower = secret.chars().any(|c| c.is_ascii_lowercase());
    let upper = secret.chars().any(|c| c.is_ascii_uppercase());
    let digit = secret.chars().any(|c| c.is_ascii_digit());
    if lower && upper && digit {
        return Ok(());
    }
    Err(rule(
        "secret_strength",
        "secret must contain at least one uppercase letter, one lowercase letter and one number",
    ))
}

/// Flattens field errors into one message, ordered by field name.
fn rejected(errors: ValidationErrors) -> AppError {
    let mut messages: Vec<(String, String)> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            let field = field.to_string();
            errs.iter().map(move |e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{field} is invalid"));
                (field.clone(), message)
            })
        })
        .collect();
    messages.sort();
    let joined: Vec<String> = messages.into_iter().map(|(_, m)| m).collect();
    AppError::ValidationFailed(joined.join("; "))
}

#[derive(Debug, Validate)]
struct HandleParam {
    #[validate(
        length(min = 3, max = 30, message = "handle must be 3-30 characters"),
        custom(function = "handle_chars")
    )]
    handle: String,
}

/// Checks a handle taken from a path segment.
pub fn handle(raw: &str) -> Result<String> {
    let param = HandleParam {
        handle: raw.trim().to_string(),
    };
    param.validate().map_err(rejected)?;
    Ok(param.handle)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(
        length(min = 3, max = 30, message = "handle must be 3-30 characters"),
        custom(function = "handle_chars")
    )]
    pub handle: String,
    #[validate(
        length(min = 8, max = 128, message = "secret must be 8-128 characters"),
        custom(function = "secret_strength")
    )]
    pub secret: String,
    /// Lowercased before the check; blank means absent.
    #[serde(default)]
    #[validate(email(message = "contact address is not a valid email"))]
    pub contact_address: Option<String>,
}

impl RegisterRequest {
    pub fn into_new_account(mut self) -> Result<NewAccount> {
        self.handle = self.handle.trim().to_string();
        self.secret = self.secret.trim().to_string();
        self.contact_address = self
            .contact_address
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty());
        self.validate().map_err(rejected)?;

        Ok(NewAccount {
            handle: self.handle,
            secret: self.secret,
            contact: self.contact_address,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "handle is required"))]
    pub handle: String,
    #[validate(length(min = 1, message = "secret is required"))]
    pub secret: String,
}

impl LoginRequest {
    /// Only presence is checked; anything else would leak which rule an
    /// existing account's secret satisfies.
    pub fn into_credentials(mut self) -> Result<(String, String)> {
        self.handle = self.handle.trim().to_string();
        self.secret = self.secret.trim().to_string();
        self.validate().map_err(rejected)?;
        Ok((self.handle, self.secret))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(min = 5, max = 200, message = "title must be 5-200 characters"))]
    pub title: String,
    #[validate(length(min = 10, max = 5000, message = "content must be 10-5000 characters"))]
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
}

impl CreatePostRequest {
    pub fn into_new_post(mut self) -> Result<NewPost> {
        self.title = self.title.trim().to_string();
        self.content = self.content.trim().to_string();
        self.validate().map_err(rejected)?;

        let category = self
            .category
            .as_deref()
            .map(|c| c.trim().parse::<Category>())
            .transpose()?;
        Ok(NewPost {
            title: self.title,
            content: self.content,
            category,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub post_id: Uuid,
    pub direction: String,
}

impl VoteRequest {
    pub fn into_vote(self) -> Result<(Uuid, Direction)> {
        Ok((self.post_id, self.direction.trim().parse()?))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    pub post_id: Uuid,
    pub threshold: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub sort: Option<PostSort>,
}

impl From<ListParams> for ListQuery {
    fn from(params: ListParams) -> Self {
        ListQuery {
            page: params.page,
            limit: params.limit,
            sort: params.sort.unwrap_or_default(),
        }
    }
}
