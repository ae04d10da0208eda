use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declares a string-backed enum that round-trips through serde and SQLite.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(raw: &str) -> anyhow::Result<Self> {
                match raw {
                    $($text => Ok(Self::$variant),)+
                    other => Err(anyhow::anyhow!(
                        concat!("unknown ", stringify!($name), ": {}"),
                        other
                    )),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let raw = value.as_str()?;
                raw.parse().map_err(|err: anyhow::Error| FromSqlError::Other(err.into()))
            }
        }
    };
}

text_enum!(Role {
    Member => "member",
    Admin => "admin",
    SuperAdmin => "super_admin",
});

text_enum!(PostType {
    Announcement => "announcement",
    Discussion => "discussion",
    PrayerRequest => "prayer-request",
});

text_enum!(MediaType {
    Photo => "photo",
    Audio => "audio",
});

text_enum!(NotificationType {
    Announcement => "announcement",
    Media => "media",
    General => "general",
});

text_enum!(
    /// `Pending` is the only non-terminal state.
    RequestStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
);

impl Default for Role {
    fn default() -> Self {
        Self::Member
    }
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub family_id: Option<String>,
    pub phone_number: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub image_url: Option<String>,
    /// Denormalized count of users whose `family_id` points here.
    pub member_count: i64,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    pub id: String,
    pub family_id: String,
    pub author_id: String,
    /// Display name captured when the post was written.
    pub author_name: String,
    pub content: String,
    #[serde(rename = "type")]
    pub post_type: PostType,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    pub id: String,
    #[serde(skip)]
    pub post_id: String,
    pub author_id: String,
    pub author_name: String,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    pub id: String,
    pub family_id: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub download_url: String,
    /// Blob store key backing this record.
    #[serde(skip)]
    pub blob_path: String,
    pub mime: Option<String>,
    pub size_bytes: i64,
    pub checksum: String,
    pub uploaded_by: String,
    pub uploaded_at: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: String,
    pub family_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    /// Shared by every member of the family.
    pub is_read: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyRequestRecord {
    pub id: String,
    pub requester_id: String,
    pub requester_name: String,
    pub family_name: String,
    pub description: String,
    pub status: RequestStatus,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub reviewed_by: Option<String>,
    pub family_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminRequestRecord {
    pub id: String,
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub phone_number: Option<String>,
    pub status: RequestStatus,
    pub created_at: String,
    pub reviewed_at: Option<String>,
    pub reviewed_by: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub user_id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}
