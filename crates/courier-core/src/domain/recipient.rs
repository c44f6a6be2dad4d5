//! Recipients and message templates.

use serde::{Deserialize, Serialize};

/// Placeholder replaced by the recipient's name.
pub const NAME_PLACEHOLDER: &str = "{{name}}";

/// Placeholder replaced by the recipient's phone number.
pub const PHONE_PLACEHOLDER: &str = "{{phone}}";

/// Target of one message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub phone: String,
}

impl Recipient {
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
        }
    }
}

/// Message text with recipient placeholders.
///
/// Rendering is a plain global string replace: every `{{name}}` and
/// `{{phone}}` occurrence is substituted, nothing is escaped, and unknown
/// `{{...}}` tokens are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageTemplate(String);

impl MessageTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Substitute placeholders in a single left-to-right pass, so values
    /// that themselves look like placeholders are copied verbatim.
    pub fn render(&self, recipient: &Recipient) -> String {
        let mut out = String::with_capacity(self.0.len());
        let mut rest = self.0.as_str();
        while let Some(pos) = rest.find("{{") {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if let Some(after) = tail.strip_prefix(NAME_PLACEHOLDER) {
                out.push_str(&recipient.name);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(PHONE_PLACEHOLDER) {
                out.push_str(&recipient.phone);
                rest = after;
            } else {
                out.push_str("{{");
                rest = &tail[2..];
            }
        }
        out.push_str(rest);
        out
    }
}

impl From<&str> for MessageTemplate {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_replaces_every_occurrence() {
        let template = MessageTemplate::new("Hi {{name}}! {{name}}, reply to {{phone}}.");
        let out = template.render(&Recipient::new("Ana", "+5511999990000"));
        assert_eq!(out, "Hi Ana! Ana, reply to +5511999990000.");
    }

    #[test]
    fn render_is_literal() {
        // Replacement text is never re-interpreted as a placeholder.
        let template = MessageTemplate::new("{{name}} {{unknown}}");
        let out = template.render(&Recipient::new("{{phone}}", "123"));
        assert_eq!(out, "{{phone}} {{unknown}}");
    }

    #[test]
    fn template_without_placeholders_is_unchanged() {
        let template = MessageTemplate::from("Promo today only");
        let out = template.render(&Recipient::new("x", "y"));
        assert_eq!(out, "Promo today only");
    }
}
