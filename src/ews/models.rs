//! EWS data models: folders, views, and the messages returned by `FindItem`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Distinguished folders addressable without knowing their item id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WellKnownFolderName {
    MsgFolderRoot,
    Inbox,
    DeletedItems,
    Drafts,
    Outbox,
    SentItems,
    JunkEmail,
    Archive,
}

impl WellKnownFolderName {
    /// The `DistinguishedFolderId` value for this folder.
    pub fn distinguished_id(&self) -> &'static str {
        match self {
            Self::MsgFolderRoot => "msgfolderroot",
            Self::Inbox => "inbox",
            Self::DeletedItems => "deleteditems",
            Self::Drafts => "drafts",
            Self::Outbox => "outbox",
            Self::SentItems => "sentitems",
            Self::JunkEmail => "junkemail",
            Self::Archive => "archive",
        }
    }
}

/// Base shape of the returned items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum BasePropertySet {
    IdOnly,
    Default,
    AllProperties,
}

impl BasePropertySet {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IdOnly => "IdOnly",
            Self::Default => "Default",
            Self::AllProperties => "AllProperties",
        }
    }
}

/// Properties that can be requested on top of the base shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyPath {
    Subject,
    DateTimeReceived,
    From,
    HasAttachments,
}

impl PropertyPath {
    /// The `FieldURI` naming this property.
    pub fn field_uri(&self) -> &'static str {
        match self {
            Self::Subject => "item:Subject",
            Self::DateTimeReceived => "item:DateTimeReceived",
            Self::From => "message:From",
            Self::HasAttachments => "item:HasAttachments",
        }
    }
}

/// Which properties to return for each item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySet {
    pub base: BasePropertySet,
    pub additional: Vec<PropertyPath>,
}

/// A page of items, counted from the newest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemView {
    pub page_size: u32,
    pub offset: u32,
    pub property_set: PropertySet,
}

impl ItemView {
    /// First page of `page_size` items with the summary fields of a message.
    pub fn message_summary(page_size: u32) -> Self {
        Self {
            page_size,
            offset: 0,
            property_set: PropertySet {
                base: BasePropertySet::IdOnly,
                additional: vec![
                    PropertyPath::Subject,
                    PropertyPath::DateTimeReceived,
                    PropertyPath::From,
                    PropertyPath::HasAttachments,
                ],
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemId {
    pub id: String,
    pub change_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailAddress {
    pub name: Option<String>,
    pub address: Option<String>,
}

/// A message as returned by `FindItem`; only requested properties are populated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailMessage {
    pub id: Option<ItemId>,
    pub subject: Option<String>,
    pub from: Option<EmailAddress>,
    pub date_time_received: Option<DateTime<Utc>>,
    pub has_attachments: Option<bool>,
}

/// One page of `FindItem` results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindItemsResults {
    pub items: Vec<EmailMessage>,
    pub total_count: u32,
    pub more_available: bool,
    pub next_page_offset: Option<u32>,
}

/// Summary row rendered by the home page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InboxMessage {
    pub subject: String,
    pub from: String,
    pub date_time_received: String,
    pub has_attachments: bool,
}

impl From<&EmailMessage> for InboxMessage {
    fn from(message: &EmailMessage) -> Self {
        Self {
            subject: message.subject.clone().unwrap_or_default(),
            from: message
                .from
                .as_ref()
                .and_then(|from| from.address.clone())
                .unwrap_or_default(),
            date_time_received: message
                .date_time_received
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_default(),
            has_attachments: message.has_attachments.unwrap_or(false),
        }
    }
}
