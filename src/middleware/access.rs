//! Scoped public-access gate.
//!
//! Every public endpoint calls [`authorize`] before touching the resource
//! store. The gate resolves the bearer token, checks the kill-switch, expiry
//! and scopes (in that order, first failure wins) and either hands back the
//! pass or a ready-to-send [`AuthFailure`].

use axum::http::{header, HeaderMap, Uri};
use chrono::{DateTime, Utc};

use crate::errors::AuthFailure;
use crate::models::pass::{mask_token, AccessPass};
use crate::store::PassStore;

/// Pull the credential from the request.
///
/// `Authorization: Bearer <token>` (scheme case-insensitive) wins over a
/// `?token=` query parameter. Blank values count as absent.
pub fn extract_token(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    bearer_token(headers).or_else(|| query_param(uri, "token").filter(|t| !t.is_empty()))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let scheme = auth.get(..7)?;
    if !scheme.eq_ignore_ascii_case("bearer ") {
        return None;
    }
    let token = auth[7..].trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// First value of a URL-decoded query parameter.
pub fn query_param(uri: &Uri, name: &str) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// Authorize a request against `required` scopes at the current time.
pub async fn authorize<S>(
    store: &S,
    headers: &HeaderMap,
    uri: &Uri,
    required: &[&str],
) -> Result<AccessPass, AuthFailure>
where
    S: PassStore + ?Sized,
{
    authorize_at(store, headers, uri, required, Utc::now()).await
}

/// Same as [`authorize`] with an explicit clock.
pub async fn authorize_at<S>(
    store: &S,
    headers: &HeaderMap,
    uri: &Uri,
    required: &[&str],
    now: DateTime<Utc>,
) -> Result<AccessPass, AuthFailure>
where
    S: PassStore + ?Sized,
{
    let token = extract_token(headers, uri).ok_or(AuthFailure::MissingToken)?;

    // Not-found and lookup errors look the same to the caller.
    let pass = match store.find_pass(&token).await {
        Ok(Some(pass)) => pass,
        Ok(None) => {
            tracing::debug!(token = %mask_token(&token), "access denied: unknown token");
            return Err(AuthFailure::InvalidToken);
        }
        Err(e) => {
            tracing::warn!(token = %mask_token(&token), "access pass lookup failed: {:#}", e);
            return Err(AuthFailure::InvalidToken);
        }
    };

    if !pass.is_active {
        tracing::debug!(token = %mask_token(&token), "access denied: pass disabled");
        return Err(AuthFailure::AccessDisabled);
    }
    if pass.is_expired_at(now) {
        tracing::debug!(token = %mask_token(&token), "access denied: pass expired");
        return Err(AuthFailure::AccessExpired);
    }
    if !pass.grants(required) {
        tracing::debug!(
            token = %mask_token(&token),
            required = ?required,
            "access denied: insufficient scope"
        );
        return Err(AuthFailure::InsufficientScope);
    }

    Ok(pass)
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pass::NewAccessPass;
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;
    use axum::http::HeaderValue;
    use chrono::Duration;

    const TOKEN: &str = "pass_0123456789abcdef";

    fn headers_with(auth: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        h
    }

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    fn store_with(scopes: &[&str], is_active: bool, expires_at: Option<DateTime<Utc>>) -> MemoryStore {
        let store = MemoryStore::new();
        store.put_pass(AccessPass {
            token: TOKEN.into(),
            label: None,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            expires_at,
            is_active,
            created_at: Utc::now(),
        });
        store
    }

    /// A store whose lookups always fail.
    struct BrokenStore;

    #[async_trait]
    impl PassStore for BrokenStore {
        async fn find_pass(&self, _token: &str) -> anyhow::Result<Option<AccessPass>> {
            anyhow::bail!("connection refused")
        }
        async fn insert_pass(&self, _pass: &NewAccessPass) -> anyhow::Result<AccessPass> {
            anyhow::bail!("connection refused")
        }
        async fn list_passes(&self) -> anyhow::Result<Vec<AccessPass>> {
            anyhow::bail!("connection refused")
        }
        async fn deactivate_pass(&self, _token: &str) -> anyhow::Result<bool> {
            anyhow::bail!("connection refused")
        }
    }

    // -- extraction --

    #[test]
    fn test_extract_bearer_scheme_case_insensitive() {
        let u = uri("/api/access/students");
        assert_eq!(extract_token(&headers_with("Bearer abc"), &u).as_deref(), Some("abc"));
        assert_eq!(extract_token(&headers_with("bearer abc"), &u).as_deref(), Some("abc"));
        assert_eq!(extract_token(&headers_with("BEARER   abc  "), &u).as_deref(), Some("abc"));
    }

    #[test]
    fn test_extract_ignores_other_schemes() {
        let u = uri("/api/access/students");
        assert_eq!(extract_token(&headers_with("Basic dXNlcjpwYXNz"), &u), None);
        assert_eq!(extract_token(&headers_with("Bearer"), &u), None);
        assert_eq!(extract_token(&headers_with("Bearer    "), &u), None);
    }

    #[test]
    fn test_extract_query_fallback() {
        let h = HeaderMap::new();
        assert_eq!(
            extract_token(&h, &uri("/api/access/attendance?date=2024-01-01&token=qs%2Btok")).as_deref(),
            Some("qs+tok")
        );
        assert_eq!(extract_token(&h, &uri("/api/access/attendance?token=")), None);
        assert_eq!(extract_token(&h, &uri("/api/access/attendance")), None);
    }

    #[test]
    fn test_extract_header_wins_over_query() {
        let h = headers_with("Bearer from-header");
        assert_eq!(
            extract_token(&h, &uri("/x?token=from-query")).as_deref(),
            Some("from-header")
        );
        // A blank bearer falls through to the query string.
        let h = headers_with("Bearer  ");
        assert_eq!(
            extract_token(&h, &uri("/x?token=from-query")).as_deref(),
            Some("from-query")
        );
    }

    // -- authorize --

    #[tokio::test]
    async fn test_missing_token_regardless_of_scopes() {
        let store = store_with(&["students:read"], true, None);
        for required in [&[][..], &["students:read"][..], &["attendance:write"][..]] {
            let err = authorize(&store, &HeaderMap::new(), &uri("/x"), required)
                .await
                .unwrap_err();
            assert_eq!(err, AuthFailure::MissingToken);
        }
    }

    #[tokio::test]
    async fn test_unknown_token_is_invalid() {
        let store = store_with(&["students:read"], true, None);
        let err = authorize(&store, &headers_with("Bearer pass_nope"), &uri("/x"), &["students:read"])
            .await
            .unwrap_err();
        assert_eq!(err, AuthFailure::InvalidToken);
    }

    #[tokio::test]
    async fn test_store_error_is_invalid_token() {
        let err = authorize(&BrokenStore, &headers_with(&format!("Bearer {TOKEN}")), &uri("/x"), &[])
            .await
            .unwrap_err();
        assert_eq!(err, AuthFailure::InvalidToken);
    }

    #[tokio::test]
    async fn test_disabled_beats_expiry_and_scope() {
        let past = Utc::now() - Duration::days(1);
        let store = store_with(&["students:read"], false, Some(past));
        let err = authorize(&store, &headers_with(&format!("Bearer {TOKEN}")), &uri("/x"), &["students:write"])
            .await
            .unwrap_err();
        assert_eq!(err, AuthFailure::AccessDisabled);

        let store = store_with(&["students:read"], false, None);
        let err = authorize(&store, &headers_with(&format!("Bearer {TOKEN}")), &uri("/x"), &["students:read"])
            .await
            .unwrap_err();
        assert_eq!(err, AuthFailure::AccessDisabled);
    }

    #[tokio::test]
    async fn test_expired_beats_scope() {
        let now = Utc::now();
        let store = store_with(&["students:read"], true, Some(now - Duration::seconds(1)));
        let h = headers_with(&format!("Bearer {TOKEN}"));

        let err = authorize_at(&store, &h, &uri("/x"), &["students:read"], now).await.unwrap_err();
        assert_eq!(err, AuthFailure::AccessExpired);

        let err = authorize_at(&store, &h, &uri("/x"), &["students:write"], now).await.unwrap_err();
        assert_eq!(err, AuthFailure::AccessExpired);
    }

    #[tokio::test]
    async fn test_future_expiry_is_accepted() {
        let now = Utc::now();
        let store = store_with(&["students:read"], true, Some(now + Duration::hours(2)));
        let pass = authorize_at(
            &store,
            &headers_with(&format!("Bearer {TOKEN}")),
            &uri("/x"),
            &["students:read"],
            now,
        )
        .await
        .unwrap();
        assert_eq!(pass.token, TOKEN);
    }

    #[tokio::test]
    async fn test_scope_check() {
        let store = store_with(&["students:read"], true, None);
        let h = headers_with(&format!("Bearer {TOKEN}"));

        let err = authorize(&store, &h, &uri("/x"), &["students:write"]).await.unwrap_err();
        assert_eq!(err, AuthFailure::InsufficientScope);

        for required in ["students:read", "Students:Read", "STUDENTS:READ"] {
            assert!(authorize(&store, &h, &uri("/x"), &[required]).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_stored_scope_case_is_ignored() {
        let store = store_with(&["Students:Read"], true, None);
        let pass = authorize(&store, &headers_with(&format!("Bearer {TOKEN}")), &uri("/x"), &["students:read"])
            .await
            .unwrap();
        assert_eq!(pass.scopes, vec!["Students:Read".to_string()], "pass returned unchanged");
    }

    #[tokio::test]
    async fn test_header_token_used_when_query_differs() {
        let store = store_with(&["attendance:read"], true, None);
        let h = headers_with(&format!("Bearer {TOKEN}"));
        let pass = authorize(&store, &h, &uri("/x?token=pass_other"), &["attendance:read"])
            .await
            .unwrap();
        assert_eq!(pass.token, TOKEN);

        // And the other way round: a bogus header is not rescued by a good query token.
        let h = headers_with("Bearer pass_other");
        let err = authorize(&store, &h, &uri(&format!("/x?token={TOKEN}")), &["attendance:read"])
            .await
            .unwrap_err();
        assert_eq!(err, AuthFailure::InvalidToken);
    }

    #[tokio::test]
    async fn test_query_token_accepted() {
        let store = store_with(&["attendance:read"], true, None);
        let pass = authorize(
            &store,
            &HeaderMap::new(),
            &uri(&format!("/x?date=2024-01-01&token={TOKEN}")),
            &["attendance:read"],
        )
        .await
        .unwrap();
        assert_eq!(pass.token, TOKEN);
    }
}
