use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scopes understood by the public-access endpoints.
/// Format: "resource:action".
pub const KNOWN_SCOPES: &[&str] = &[
    "students:read",
    "students:write",
    "attendance:read",
    "attendance:write",
];

/// A shareable, scope-limited, optionally time-boxed bearer credential.
///
/// Possession of `token` is the whole credential. Passes are minted and
/// revoked out of band (see `clubgate pass`); request handling only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessPass {
    pub token: String,
    pub label: Option<String>,
    pub scopes: Vec<String>,
    /// `None` means the pass never expires.
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl AccessPass {
    /// True when `expires_at` is set and strictly before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp < now)
    }

    /// Case-insensitive subset check: every required scope must be granted.
    /// An empty requirement list is always satisfied.
    pub fn grants<S: AsRef<str>>(&self, required: &[S]) -> bool {
        let have: HashSet<String> = self.scopes.iter().map(|s| s.to_lowercase()).collect();
        required
            .iter()
            .all(|s| have.contains(&s.as_ref().to_lowercase()))
    }
}

/// Input for minting a pass.
#[derive(Debug, Clone)]
pub struct NewAccessPass {
    pub token: String,
    pub label: Option<String>,
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Normalize a scope list for storage: trimmed, lower-cased, deduplicated,
/// and restricted to [`KNOWN_SCOPES`].
pub fn normalize_scopes<S: AsRef<str>>(raw: &[S]) -> Result<Vec<String>, String> {
    let mut out: Vec<String> = Vec::new();
    for scope in raw {
        let s = scope.as_ref().trim().to_lowercase();
        if s.is_empty() {
            continue;
        }
        if !KNOWN_SCOPES.contains(&s.as_str()) {
            return Err(format!(
                "unknown scope '{}' (expected one of: {})",
                s,
                KNOWN_SCOPES.join(", ")
            ));
        }
        if !out.contains(&s) {
            out.push(s);
        }
    }
    if out.is_empty() {
        return Err("at least one scope is required".to_string());
    }
    Ok(out)
}

/// Generate a fresh opaque pass token: `pass_` followed by 32 hex chars.
pub fn generate_token() -> String {
    use rand::RngCore;
    let mut random_bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut random_bytes);
    format!("pass_{}", hex::encode(random_bytes))
}

/// Shorten a token for logs and listings. Never log a full token.
pub fn mask_token(token: &str) -> String {
    match token.char_indices().nth(9) {
        Some((idx, _)) => format!("{}…", &token[..idx]),
        None => "****".to_string(),
    }
}
