use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single mailbox message, shaped like the Graph `message` resource.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub from: Option<Recipient>,
    #[serde(default)]
    pub sender: Option<Recipient>,
    #[serde(default)]
    pub received_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub body: Option<ItemBody>,
    #[serde(default)]
    pub internet_message_headers: Option<Vec<Header>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    #[serde(default)]
    pub email_address: Option<EmailAddress>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EmailAddress {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBody {
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Recipient {
    fn address(&self) -> Option<&str> {
        self.email_address
            .as_ref()
            .and_then(|e| e.address.as_deref())
            .filter(|a| !a.is_empty())
    }
}

impl Message {
    /// The `from` address, falling back to `sender`.
    pub fn sender_address(&self) -> Option<&str> {
        self.from
            .as_ref()
            .and_then(Recipient::address)
            .or_else(|| self.sender.as_ref().and_then(Recipient::address))
    }

    pub fn body_content(&self) -> &str {
        self.body
            .as_ref()
            .and_then(|b| b.content.as_deref())
            .unwrap_or("")
    }

    pub fn headers(&self) -> &[Header] {
        self.internet_message_headers.as_deref().unwrap_or(&[])
    }
}
