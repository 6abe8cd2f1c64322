//! Send request entity
//!
//! The SendGrid part of a request is kept close to the v3 mail/send payload:
//! fields the service does not inspect are carried through untouched.

use crate::error::{Result, TemplgridError};
use serde::{Deserialize, Serialize};

/// SendGrid accepts at most this many personalizations per request
pub const MAX_PERSONALIZATIONS: usize = 1000;

/// Body of `POST /email`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRequest {
    pub template_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub locale: String,
    #[serde(default)]
    pub email_parameters: serde_json::Value,
    #[serde(default)]
    pub send_grid_parameters: SendGridMail,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailAddress {
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Personalization {
    #[serde(default)]
    pub to: Vec<EmailAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<EmailAddress>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(rename = "type")]
    pub content_type: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub enable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MailSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox_mode: Option<Setting>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// SendGrid v3 mail/send payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendGridMail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<EmailAddress>,
    #[serde(default)]
    pub personalizations: Vec<Personalization>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail_settings: Option<MailSettings>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SendGridMail {
    /// Set subject and HTML body, replacing any content sent by the caller.
    pub fn set_rendered(&mut self, subject: String, html: String) {
        self.subject = Some(subject);
        self.content = vec![Content {
            content_type: "text/html".to_string(),
            value: html,
        }];
    }

    pub fn set_sandbox(&mut self, enable: bool) {
        self.mail_settings
            .get_or_insert_with(MailSettings::default)
            .sandbox_mode = Some(Setting { enable });
    }
}

fn invalid(field: &str) -> TemplgridError {
    TemplgridError::InvalidRequest(format!("incorrect value for {}", field))
}

impl EmailRequest {
    pub fn validate(&self) -> Result<()> {
        if self.template_name.trim().is_empty() {
            return Err(invalid("template_name"));
        }

        let mail = &self.send_grid_parameters;
        let personalizations = mail.personalizations.len();
        if personalizations == 0 || personalizations > MAX_PERSONALIZATIONS {
            return Err(invalid("send_grid_parameters.personalizations"));
        }

        let has_from = mail.from.as_ref().is_some_and(|from| !from.email.is_empty());
        for personalization in &mail.personalizations {
            if personalization.to.iter().any(|to| to.email.is_empty()) {
                return Err(invalid("send_grid_parameters.personalizations.*.to"));
            }
            let own_from = personalization
                .from
                .as_ref()
                .is_some_and(|from| !from.email.is_empty());
            if !has_from && !own_from {
                return Err(invalid("send_grid_parameters.personalizations.*.from"));
            }
        }

        Ok(())
    }
}
