//! Creator onboarding data contract, its field rules and submission.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::api::IroBackend;
use crate::error::{ClientError, Result};
use crate::session::AuthSession;
use crate::types::CreatorApplication;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialPlatform {
    Twitter,
    Instagram,
    Youtube,
    Tiktok,
    Linkedin,
    Facebook,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SocialAccount {
    pub platform: SocialPlatform,
    pub handle: String,
    pub url: String,
}

/// What a creator submits to apply for an IRO.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingApplication {
    pub full_name: String,
    pub email: String,
    pub bio: String,
    /// Sent to the server as `contactNumber`
    pub phone_number: String,
    pub socials: Vec<SocialAccount>,
    pub content_ownership_declared: bool,
}

/// Body of the application submission, in the server's field names.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreatorApplicationRequest {
    pub name: String,
    pub description: String,
    pub contact_number: String,
    pub email_address: String,
    pub socials: Vec<SocialAccount>,
}

/// One failed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: &'static str,
}

impl FieldError {
    fn new(field: impl Into<String>, message: &'static str) -> Self {
        Self {
            field: field.into(),
            message,
        }
    }
}

impl OnboardingApplication {
    /// Every rule the application breaks, in form order.
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        let name_len = self.full_name.chars().count();
        if name_len == 0 {
            errors.push(FieldError::new("fullName", "Full name is required"));
        } else if name_len < 2 {
            errors.push(FieldError::new("fullName", "Full name must be at least 2 characters"));
        } else if name_len > 100 {
            errors.push(FieldError::new("fullName", "Full name cannot exceed 100 characters"));
        }

        if !is_email(&self.email) {
            errors.push(FieldError::new("email", "Please enter a valid email address"));
        }

        let bio_len = self.bio.chars().count();
        if bio_len == 0 {
            errors.push(FieldError::new("bio", "Bio is required"));
        } else if bio_len < 50 {
            errors.push(FieldError::new(
                "bio",
                "Bio must be at least 50 characters to provide enough context",
            ));
        } else if bio_len > 500 {
            errors.push(FieldError::new("bio", "Bio cannot exceed 500 characters"));
        }

        let phone_len = self.phone_number.chars().count();
        if phone_len < 10 {
            errors.push(FieldError::new(
                "phoneNumber",
                "Phone number must be at least 10 digits",
            ));
        } else if phone_len > 15 {
            errors.push(FieldError::new("phoneNumber", "Phone number is too long"));
        }

        if self.socials.is_empty() {
            errors.push(FieldError::new(
                "socials",
                "Please link at least one social media account",
            ));
        }
        for (i, social) in self.socials.iter().enumerate() {
            let handle_len = social.handle.chars().count();
            if handle_len == 0 {
                errors.push(FieldError::new(format!("socials[{i}].handle"), "Social handle is required"));
            } else if handle_len > 100 {
                errors.push(FieldError::new(format!("socials[{i}].handle"), "Handle is too long"));
            }

            if social.url.is_empty() {
                errors.push(FieldError::new(format!("socials[{i}].url"), "URL is required"));
            } else if !is_web_url(&social.url) {
                errors.push(FieldError::new(
                    format!("socials[{i}].url"),
                    "Please enter a valid URL (e.g., https://twitter.com/user)",
                ));
            } else if social.url.chars().count() > 500 {
                errors.push(FieldError::new(format!("socials[{i}].url"), "URL is too long"));
            }
        }

        if !self.content_ownership_declared {
            errors.push(FieldError::new(
                "contentOwnershipDeclared",
                "You must declare content ownership and agree to terms to proceed",
            ));
        }

        errors
    }

    /// Fails with the first broken rule.
    pub fn ensure_valid(&self) -> Result<()> {
        match self.validate().into_iter().next() {
            Some(error) => Err(ClientError::Validation(format!(
                "{}: {}",
                error.field, error.message
            ))),
            None => Ok(()),
        }
    }

    pub fn to_request(&self) -> CreatorApplicationRequest {
        CreatorApplicationRequest {
            name: self.full_name.clone(),
            description: self.bio.clone(),
            contact_number: self.phone_number.clone(),
            email_address: self.email.clone(),
            socials: self.socials.clone(),
        }
    }
}

/// Validate locally, then submit for the session's user.
#[instrument(skip_all, fields(name = %application.full_name))]
pub async fn submit_application(
    backend: &dyn IroBackend,
    application: &OnboardingApplication,
    session: &dyn AuthSession,
) -> Result<CreatorApplication> {
    application.ensure_valid()?;
    let token = session
        .access_token()
        .await
        .ok_or(ClientError::NotAuthenticated)?;
    let submitted = backend
        .submit_application(&token, &application.to_request())
        .await?;
    info!("Submitted onboarding application {}", submitted.id);
    Ok(submitted)
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || value.chars().any(char::is_whitespace) || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

fn is_web_url(value: &str) -> bool {
    Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> OnboardingApplication {
        OnboardingApplication {
            full_name: "Ada Creator".into(),
            email: "ada@example.com".into(),
            bio: "I make long-form videos about the history of computing and hardware.".into(),
            phone_number: "+15551234567".into(),
            socials: vec![SocialAccount {
                platform: SocialPlatform::Youtube,
                handle: "adacreates".into(),
                url: "https://youtube.com/@adacreates".into(),
            }],
            content_ownership_declared: true,
        }
    }

    #[test]
    fn test_valid_application_passes() {
        assert!(valid().validate().is_empty());
        assert!(valid().ensure_valid().is_ok());
    }

    #[test]
    fn test_length_rules() {
        let mut app = valid();
        app.full_name = "A".into();
        app.bio = "too short".into();
        app.phone_number = "1234567890123456".into();
        let fields: Vec<String> = app.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["fullName", "bio", "phoneNumber"]);
    }

    #[test]
    fn test_email_shapes() {
        assert!(is_email("a@b.co"));
        assert!(!is_email("a@b"));
        assert!(!is_email("@b.co"));
        assert!(!is_email("a@@b.co"));
        assert!(!is_email("a b@c.co"));
        assert!(!is_email("a@b..co"));
    }

    #[test]
    fn test_socials_required_and_checked() {
        let mut app = valid();
        app.socials.clear();
        assert_eq!(app.validate()[0].field, "socials");

        let mut app = valid();
        app.socials[0].url = "ftp://example.com/me".into();
        app.socials[0].handle = String::new();
        let errors = app.validate();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "Social handle is required");
        assert_eq!(errors[1].field, "socials[0].url");
    }

    #[test]
    fn test_ownership_must_be_declared() {
        let mut app = valid();
        app.content_ownership_declared = false;
        let err = app.ensure_valid().unwrap_err();
        assert!(err.to_string().starts_with("contentOwnershipDeclared"));
    }

    #[test]
    fn test_deserializes_form_payload() {
        let app: OnboardingApplication = serde_json::from_value(serde_json::json!({
            "fullName": "Ada Creator",
            "email": "ada@example.com",
            "bio": "b",
            "phoneNumber": "5551234567",
            "socials": [{"platform": "twitter", "handle": "ada", "url": "https://x.com/ada"}],
            "contentOwnershipDeclared": true
        }))
        .unwrap();
        assert_eq!(app.socials[0].platform, SocialPlatform::Twitter);
    }

    #[test]
    fn test_request_uses_server_field_names() {
        let body = serde_json::to_value(valid().to_request()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "name": "Ada Creator",
                "description": "I make long-form videos about the history of computing and hardware.",
                "contactNumber": "+15551234567",
                "emailAddress": "ada@example.com",
                "socials": [{
                    "platform": "youtube",
                    "handle": "adacreates",
                    "url": "https://youtube.com/@adacreates"
                }]
            })
        );
    }
}
