use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Login credentials sent to the backend
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    #[serde(serialize_with = "serialize_secret")]
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::new(password.into()),
        }
    }
}

/// Profile of the signed-in administrator
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Profile {
    /// Numeric ids are kept in their decimal form
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: Option<String>,
    #[serde(default, alias = "userName")]
    pub username: String,
    #[serde(default, alias = "displayName")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "departmentName")]
    pub department: Option<String>,
    #[serde(default, deserialize_with = "deserialize_roles")]
    pub roles: Vec<String>,
}

/// Token candidates carried by a login or refresh response
#[derive(Debug, Clone, Default)]
pub struct TokenGrant {
    /// Value of the token response header
    pub header_token: Option<String>,
    /// Value found at the configured body field
    pub body_token: Option<String>,
}

impl TokenGrant {
    /// Header token wins over body token; blank values count as absent.
    pub fn preferred(self) -> Option<SecretString> {
        let non_blank = |t: Option<String>| t.filter(|v| !v.trim().is_empty());
        non_blank(self.header_token)
            .or_else(|| non_blank(self.body_token))
            .map(|t| SecretString::new(t.trim().to_string()))
    }
}

/// Result of a call to `refresh_now`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new token was stored
    Rotated,
    /// The refresh succeeded but carried no token; the old one is kept
    Unchanged,
    /// Another refresh was already in flight; no call was made
    Skipped,
    /// The session was logged out while the call was in flight; nothing was stored
    Discarded,
}

// Custom serialization for SecretString
pub fn serialize_secret<S>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::ser::Serializer,
{
    serializer.serialize_str(secret.expose_secret())
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(id) => Some(id),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    })
}

// null and single-string role fields both show up in the wild
fn deserialize_roles<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(roles) => roles
            .into_iter()
            .filter_map(|role| match role {
                Value::String(role) => Some(role),
                _ => None,
            })
            .collect(),
        Value::String(role) => vec![role],
        _ => Vec::new(),
    })
}
