use anyhow::Result;

use crate::database::store::{ActivityStore, IdentityQuery};
use crate::models::activity::{ActivitySnapshot, SnapshotKind};
use crate::models::category::UserProfile;

/// Owners whose window titles carry an em-dash-delimited project suffix
/// ("file — ProjectName"). Any file within the same project counts as the
/// same activity.
const CODE_EDITOR_OWNERS: [&str; 3] = ["Cursor", "Code", "Visual Studio Code"];

/// A history cache hit: the prior category plus whatever reasoning was
/// stored with it. History never carries an LLM summary.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryHit {
    pub category_id: String,
    pub category_reasoning: Option<String>,
}

/// Reuse the most recent prior decision for the same activity identity, if
/// one exists and its category is still alive.
///
/// Multi-purpose apps are never resolved from history: the same app name
/// can mean productive or unproductive time, so every occurrence gets a
/// fresh LLM judgement.
pub async fn resolve(
    store: &dyn ActivityStore,
    user_id: &str,
    profile: &UserProfile,
    snapshot: &ActivitySnapshot,
) -> Result<Option<HistoryHit>> {
    if let Some(owner) = snapshot.owner_name.as_deref() {
        if profile.multi_purpose_apps.iter().any(|app| app == owner) {
            log::debug!("{} is multi-purpose, skipping history lookup", owner);
            return Ok(None);
        }
    }

    let query = match build_identity_query(snapshot) {
        Some(q) => q,
        // Nothing discriminating to match on. "Most recent event for this
        // user" is not an identity.
        None => return Ok(None),
    };

    let event = match store.latest_event(user_id, &query).await? {
        Some(e) => e,
        None => return Ok(None),
    };

    let category_id = match event.category_id {
        Some(id) if !id.is_empty() => id,
        _ => return Ok(None),
    };

    // The category may have been deleted since the event was recorded.
    // Never surface a dangling id.
    if store.category_by_id(&category_id).await?.is_none() {
        log::debug!(
            "history points at deleted category {}, treating as miss",
            category_id
        );
        return Ok(None);
    }

    Ok(Some(HistoryHit {
        category_id,
        category_reasoning: event.category_reasoning,
    }))
}

/// Pick the most specific identity the snapshot supports.
pub fn build_identity_query(snapshot: &ActivitySnapshot) -> Option<IdentityQuery> {
    let owner = snapshot.owner_name.as_deref().filter(|s| !s.is_empty());
    let title = snapshot.title.as_deref().filter(|s| !s.is_empty());
    let url = snapshot.url.as_deref().filter(|s| !s.is_empty());

    if snapshot.kind == SnapshotKind::Browser {
        if let Some(u) = url {
            return Some(IdentityQuery::Url(u.to_string()));
        }
        if let (Some(o), Some(t)) = (owner, title) {
            return Some(IdentityQuery::OwnerTitle {
                owner: o.to_string(),
                title: t.to_string(),
            });
        }
    }

    let owner = owner?;

    if is_code_editor(owner) {
        if let Some(project) = title.and_then(parse_project_suffix) {
            return Some(IdentityQuery::OwnerProject {
                owner: owner.to_string(),
                project,
            });
        }
    }

    Some(IdentityQuery::Owner(owner.to_string()))
}

fn is_code_editor(owner: &str) -> bool {
    CODE_EDITOR_OWNERS.iter().any(|o| *o == owner)
}

/// Extract the project name from an editor title like "main.rs — focustrack".
fn parse_project_suffix(title: &str) -> Option<String> {
    let (_, suffix) = title.rsplit_once('\u{2014}')?;
    let project = suffix.trim();
    if project.is_empty() {
        None
    } else {
        Some(project.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(kind: SnapshotKind) -> ActivitySnapshot {
        ActivitySnapshot {
            owner_name: None,
            title: None,
            url: None,
            content: None,
            kind,
            browser: None,
            duration_ms: None,
        }
    }

    #[test]
    fn test_browser_url_wins() {
        let mut s = snapshot(SnapshotKind::Browser);
        s.owner_name = Some("Firefox".to_string());
        s.title = Some("Docs".to_string());
        s.url = Some("https://docs.rs/regex".to_string());

        assert_eq!(
            build_identity_query(&s),
            Some(IdentityQuery::Url("https://docs.rs/regex".to_string()))
        );
    }

    #[test]
    fn test_browser_without_url_falls_back_to_owner_title() {
        let mut s = snapshot(SnapshotKind::Browser);
        s.owner_name = Some("Firefox".to_string());
        s.title = Some("New Tab".to_string());

        assert_eq!(
            build_identity_query(&s),
            Some(IdentityQuery::OwnerTitle {
                owner: "Firefox".to_string(),
                title: "New Tab".to_string(),
            })
        );
    }

    #[test]
    fn test_editor_title_yields_project_match() {
        let mut s = snapshot(SnapshotKind::Window);
        s.owner_name = Some("Code".to_string());
        s.title = Some("resolver.rs \u{2014} focustrack".to_string());

        assert_eq!(
            build_identity_query(&s),
            Some(IdentityQuery::OwnerProject {
                owner: "Code".to_string(),
                project: "focustrack".to_string(),
            })
        );
    }

    #[test]
    fn test_editor_without_project_suffix_falls_back_to_owner() {
        let mut s = snapshot(SnapshotKind::Window);
        s.owner_name = Some("Cursor".to_string());
        s.title = Some("untitled".to_string());

        assert_eq!(
            build_identity_query(&s),
            Some(IdentityQuery::Owner("Cursor".to_string()))
        );
    }

    #[test]
    fn test_plain_window_matches_on_owner() {
        let mut s = snapshot(SnapshotKind::Window);
        s.owner_name = Some("Spotify".to_string());

        assert_eq!(
            build_identity_query(&s),
            Some(IdentityQuery::Owner("Spotify".to_string()))
        );
    }

    #[test]
    fn test_no_discriminating_field_yields_none() {
        let s = snapshot(SnapshotKind::Window);
        assert_eq!(build_identity_query(&s), None);

        // A browser snapshot with no owner, title or url is equally useless
        let s = snapshot(SnapshotKind::Browser);
        assert_eq!(build_identity_query(&s), None);
    }

    #[test]
    fn test_parse_project_suffix() {
        assert_eq!(
            parse_project_suffix("main.rs \u{2014} focustrack"),
            Some("focustrack".to_string())
        );
        assert_eq!(parse_project_suffix("no dash here"), None);
        assert_eq!(parse_project_suffix("trailing \u{2014} "), None);
    }
}
