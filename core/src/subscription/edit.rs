//! Group editing on subscription documents
//!
//! All operations are pure: they take the current document and return an
//! edited copy, so a rejected edit never leaves a half-applied document.

use taprule_types::{AppRaw, GroupRaw, SubscriptionRaw};

use super::compile::GroupRawExt;
use super::document::{parse_group_raw, validate_app, validate_group};
use super::error::EditError;

fn find_app<'a>(doc: &'a SubscriptionRaw, app_id: &str) -> Result<&'a AppRaw, EditError> {
    doc.app(app_id).ok_or_else(|| EditError::UnknownApp {
        app_id: app_id.to_string(),
    })
}

fn check_group(group: &GroupRaw) -> Result<(), EditError> {
    validate_group(group).map_err(|source| EditError::Payload { source })?;
    group.compile().map_err(|source| EditError::InvalidGroup {
        name: group.name.clone(),
        source,
    })?;
    Ok(())
}

/// Append groups to an app.
///
/// Incoming keys are ignored: new groups get `max(existing) + 1 + i` in
/// input order, starting from 0 when the app has no groups.
pub fn add_groups(
    doc: &SubscriptionRaw,
    app_id: &str,
    groups: Vec<GroupRaw>,
) -> Result<SubscriptionRaw, EditError> {
    let app = find_app(doc, app_id)?;
    if groups.is_empty() {
        return Err(EditError::EmptyBatch);
    }

    let mut names: Vec<&str> = app.groups.iter().map(|g| g.name.as_str()).collect();
    for group in &groups {
        check_group(group)?;
        if names.contains(&group.name.as_str()) {
            return Err(EditError::NameCollision {
                name: group.name.clone(),
            });
        }
        names.push(&group.name);
    }

    let base = match app.max_group_key() {
        Some(max) => max.checked_add(1),
        None => Some(0),
    };
    let new_keys = (0..groups.len())
        .map(|i| {
            let offset = i32::try_from(i).ok()?;
            base?.checked_add(offset)
        })
        .collect::<Option<Vec<i32>>>()
        .ok_or_else(|| EditError::KeysExhausted {
            app_id: app_id.to_string(),
        })?;

    let mut edited = doc.clone();
    if let Some(app) = edited.app_mut(app_id) {
        for (key, mut group) in new_keys.into_iter().zip(groups) {
            group.key = key;
            app.groups.push(group);
        }
    }
    Ok(edited)
}

/// Add groups from pasted text: either a whole app payload for `app_id` or a
/// single group.
pub fn add_from_source(
    doc: &SubscriptionRaw,
    app_id: &str,
    text: &str,
) -> Result<SubscriptionRaw, EditError> {
    // Anything shaped like an app is judged as an app
    if let Ok(app) = serde_json::from_str::<AppRaw>(text) {
        validate_app(&app).map_err(|source| EditError::InvalidApp {
            app_id: app.id.clone(),
            source,
        })?;
        if app.id != app_id {
            return Err(EditError::AppMismatch {
                expected: app_id.to_string(),
                found: app.id,
            });
        }
        return add_groups(doc, app_id, app.groups);
    }

    let group = parse_group_raw(text).map_err(|source| EditError::Payload { source })?;
    add_groups(doc, app_id, vec![group])
}

/// Replace the group stored under `original_key`. The key itself is fixed.
pub fn edit_group(
    doc: &SubscriptionRaw,
    app_id: &str,
    original_key: i32,
    group: GroupRaw,
) -> Result<SubscriptionRaw, EditError> {
    let app = find_app(doc, app_id)?;
    let position = app
        .groups
        .iter()
        .position(|g| g.key == original_key)
        .ok_or_else(|| EditError::UnknownGroup {
            app_id: app_id.to_string(),
            key: original_key,
        })?;

    if group.key != original_key {
        return Err(EditError::KeyChanged {
            original: original_key,
            key: group.key,
        });
    }
    check_group(&group)?;
    if app
        .groups
        .iter()
        .any(|g| g.key != original_key && g.name == group.name)
    {
        return Err(EditError::NameCollision { name: group.name });
    }

    let mut edited = doc.clone();
    if let Some(app) = edited.app_mut(app_id) {
        app.groups[position] = group;
    }
    Ok(edited)
}

pub fn delete_group(
    doc: &SubscriptionRaw,
    app_id: &str,
    key: i32,
) -> Result<SubscriptionRaw, EditError> {
    let app = find_app(doc, app_id)?;
    if app.group(key).is_none() {
        return Err(EditError::UnknownGroup {
            app_id: app_id.to_string(),
            key,
        });
    }

    let mut edited = doc.clone();
    if let Some(app) = edited.app_mut(app_id) {
        app.groups.retain(|g| g.key != key);
    }
    Ok(edited)
}
