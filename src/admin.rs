//! Out-of-band pass administration used by `clubgate pass ...`.

use chrono::{DateTime, Duration, Utc};

use crate::models::pass::{generate_token, mask_token, normalize_scopes, AccessPass, NewAccessPass};
use crate::store::PassStore;

/// Mint a pass with a fresh random token.
pub async fn mint_pass<S>(
    store: &S,
    scopes: &[String],
    label: Option<String>,
    ttl_hours: Option<u32>,
    now: DateTime<Utc>,
) -> anyhow::Result<AccessPass>
where
    S: PassStore + ?Sized,
{
    let scopes = normalize_scopes(scopes).map_err(|e| anyhow::anyhow!(e))?;
    let label = label.map(|l| l.trim().to_string()).filter(|l| !l.is_empty());
    let expires_at = match ttl_hours {
        Some(h) => Some(
            now.checked_add_signed(Duration::hours(i64::from(h)))
                .ok_or_else(|| anyhow::anyhow!("ttl of {} hours is too large", h))?,
        ),
        None => None,
    };

    let pass = store
        .insert_pass(&NewAccessPass {
            token: generate_token(),
            label,
            scopes,
            expires_at,
        })
        .await?;

    tracing::info!(
        token = %mask_token(&pass.token),
        scopes = ?pass.scopes,
        expires_at = ?pass.expires_at,
        "access pass minted"
    );
    Ok(pass)
}

/// Mint one non-expiring pass per comma-separated scope list.
///
/// Used by `serve --seed-pass` so a fresh in-memory store is reachable.
pub async fn seed_passes<S>(
    store: &S,
    scope_lists: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<Vec<AccessPass>>
where
    S: PassStore + ?Sized,
{
    let mut minted = Vec::with_capacity(scope_lists.len());
    for scope_list in scope_lists {
        let scopes: Vec<String> = scope_list.split(',').map(str::to_string).collect();
        let pass = mint_pass(store, &scopes, Some("seeded at startup".to_string()), None, now)
            .await
            .map_err(|e| anyhow::anyhow!("seed pass '{}': {}", scope_list, e))?;
        minted.push(pass);
    }
    Ok(minted)
}

/// Render passes as a fixed-width table. Tokens are masked.
pub fn format_pass_table(passes: &[AccessPass], now: DateTime<Utc>) -> String {
    let mut out = format!(
        "{:<12} {:<20} {:<36} {:<22} {:<8}\n",
        "TOKEN", "LABEL", "SCOPES", "EXPIRES", "STATUS"
    );
    for p in passes {
        let expires = p
            .expires_at
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        let status = if !p.is_active {
            "disabled"
        } else if p.is_expired_at(now) {
            "expired"
        } else {
            "active"
        };
        out.push_str(&format!(
            "{:<12} {:<20} {:<36} {:<22} {:<8}\n",
            mask_token(&p.token),
            p.label.as_deref().unwrap_or("-"),
            p.scopes.join(","),
            expires,
            status
        ));
    }
    out
}
