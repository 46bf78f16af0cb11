//! Email payload for the SharePoint send-email utility.

use serde_json::{json, Value};

use crate::error::SpError;

/// An HTML email sent through the site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailMessage {
    /// Sender address.
    pub from: String,
    /// Recipient addresses.
    pub to: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub body_html: String,
}

impl EmailMessage {
    /// Builds the `SP.Utilities.EmailProperties` payload.
    pub fn to_payload(&self) -> Value {
        json!({
            "properties": {
                "__metadata": { "type": "SP.Utilities.EmailProperties" },
                "From": self.from,
                "To": { "results": self.to },
                "Subject": self.subject,
                "Body": self.body_html,
            }
        })
    }

    pub(crate) fn validate(&self) -> Result<(), SpError> {
        if self.to.iter().all(|to| to.trim().is_empty()) {
            return Err(SpError::validation("at least one recipient is required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_payload_shape() {
        let message = EmailMessage {
            from: "noreply@contoso.com".to_string(),
            to: vec!["a@contoso.com".to_string(), "b@contoso.com".to_string()],
            subject: "Hello".to_string(),
            body_html: "<p>Hi</p>".to_string(),
        };
        assert_eq!(
            message.to_payload(),
            json!({
                "properties": {
                    "__metadata": {"type": "SP.Utilities.EmailProperties"},
                    "From": "noreply@contoso.com",
                    "To": {"results": ["a@contoso.com", "b@contoso.com"]},
                    "Subject": "Hello",
                    "Body": "<p>Hi</p>"
                }
            })
        );
    }

    #[test]
    fn test_requires_recipient() {
        let message = EmailMessage {
            to: vec![" ".to_string()],
            ..EmailMessage::default()
        };
        assert!(message.validate().is_err());
    }
}
