//! Role/activity/permission resolution.
//!
//! The mapping table stores `permission_ids` denormalized: current rows hold
//! a JSON array of id strings, legacy rows a single comma-joined string.
//! Both shapes are normalized here, at the resolver boundary, before any
//! comparison happens.
//!
//! `has_permission` is the sole authorization checkpoint in front of
//! protected actions and is fail-closed on every branch: a missing user
//! role, unknown activity, unknown permission, empty mapping, or a database
//! error all resolve to a denial, never to an error surfaced to the caller.

use diesel::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::User;
use crate::schema::{activities, permissions, role_activity_permissions};

/// Permission names granted to a role for one activity.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPermissions {
    pub activity_id: Uuid,
    pub activity_name: String,
    pub permission_names: Vec<String>,
}

/// Normalizes a stored `permission_ids` value into an ordered, deduplicated
/// list of id strings. Accepts a JSON array of strings or a comma-joined
/// string; anything else yields an empty list.
pub fn permission_id_list(value: &serde_json::Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        serde_json::Value::String(joined) => {
            joined.split(',').map(str::to_string).collect()
        }
        _ => Vec::new(),
    };

    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

/// Set form of [`permission_id_list`], for containment checks.
pub fn permission_id_set(value: &serde_json::Value) -> HashSet<String> {
    permission_id_list(value).into_iter().collect()
}

/// Aggregate view: the permission names granted per activity for one role.
///
/// Ids referenced by any row of the role are resolved through one batch
/// lookup, then distributed back per row. Ids without a matching permission
/// record are dropped silently.
pub fn resolve_role_permissions(
    conn: &mut PgConnection,
    role_id: Uuid,
) -> QueryResult<Vec<ActivityPermissions>> {
    let rows: Vec<(Uuid, String, serde_json::Value)> = role_activity_permissions::table
        .inner_join(activities::table)
        .filter(role_activity_permissions::role_id.eq(role_id))
        .order(activities::name.asc())
        .select((
            activities::id,
            activities::name,
            role_activity_permissions::permission_ids,
        ))
        .load(conn)?;

    let mut referenced: HashSet<String> = HashSet::new();
    for (_, _, value) in &rows {
        referenced.extend(permission_id_list(value));
    }

    let referenced_uuids: Vec<Uuid> = referenced
        .iter()
        .filter_map(|id| Uuid::parse_str(id).ok())
        .collect();

    let resolved: Vec<(Uuid, String)> = permissions::table
        .filter(permissions::id.eq_any(&referenced_uuids))
        .select((permissions::id, permissions::name))
        .load(conn)?;

    let names_by_id: HashMap<String, String> = resolved
        .into_iter()
        .map(|(id, name)| (id.to_string(), name))
        .collect();

    Ok(distribute_names(&rows, &names_by_id))
}

fn distribute_names(
    rows: &[(Uuid, String, serde_json::Value)],
    names_by_id: &HashMap<String, String>,
) -> Vec<ActivityPermissions> {
    rows.iter()
        .map(|(activity_id, activity_name, value)| ActivityPermissions {
            activity_id: *activity_id,
            activity_name: activity_name.clone(),
            permission_names: permission_id_list(value)
                .iter()
                .filter_map(|id| names_by_id.get(id).cloned())
                .collect(),
        })
        .collect()
}

/// Single-action check: does `user`'s role grant `action` on `activity_name`?
///
/// Fail-closed: any missing link or database error resolves to `false`.
pub fn has_permission(
    conn: &mut PgConnection,
    user: &User,
    action: &str,
    activity_name: &str,
) -> bool {
    match check_permission(conn, user, action, activity_name) {
        Ok(granted) => granted,
        Err(e) => {
            warn!(
                error = %e,
                user_id = %user.id,
                action = %action,
                activity = %activity_name,
                "Permission check failed, denying"
            );
            false
        }
    }
}

fn check_permission(
    conn: &mut PgConnection,
    user: &User,
    action: &str,
    activity_name: &str,
) -> QueryResult<bool> {
    if !user.is_active {
        return Ok(false);
    }

    let Some(role_id) = user.role_id else {
        return Ok(false);
    };

    let activity_id: Option<Uuid> = activities::table
        .filter(activities::name.eq(activity_name))
        .filter(activities::is_active.eq(true))
        .select(activities::id)
        .first(conn)
        .optional()?;
    let Some(activity_id) = activity_id else {
        return Ok(false);
    };

    let permission_id: Option<Uuid> = permissions::table
        .filter(permissions::name.eq(action))
        .filter(permissions::status.eq(true))
        .select(permissions::id)
        .first(conn)
        .optional()?;
    let Some(permission_id) = permission_id else {
        return Ok(false);
    };

    let mapping_rows: Vec<serde_json::Value> = role_activity_permissions::table
        .filter(role_activity_permissions::role_id.eq(role_id))
        .filter(role_activity_permissions::activity_id.eq(activity_id))
        .select(role_activity_permissions::permission_ids)
        .load(conn)?;

    let wanted = permission_id.to_string();
    Ok(mapping_rows
        .iter()
        .any(|value| permission_id_set(value).contains(&wanted)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_array_shape() {
        let value = json!(["p1", "p2", "p3"]);
        assert_eq!(permission_id_list(&value), vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_normalize_comma_string_shape() {
        let value = json!("p1,p2,p3");
        assert_eq!(permission_id_list(&value), vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_both_shapes_agree() {
        let array = json!(["a", "b"]);
        let joined = json!("a,b");
        assert_eq!(permission_id_set(&array), permission_id_set(&joined));
    }

    #[test]
    fn test_normalize_trims_and_drops_empties() {
        let value = json!(" p1 , ,p2,, p1 ");
        assert_eq!(permission_id_list(&value), vec!["p1", "p2"]);
    }

    #[test]
    fn test_normalize_single_id_string() {
        let value = json!("p1");
        assert_eq!(permission_id_list(&value), vec!["p1"]);
    }

    #[test]
    fn test_normalize_rejects_other_shapes() {
        assert!(permission_id_list(&json!(null)).is_empty());
        assert!(permission_id_list(&json!(42)).is_empty());
        assert!(permission_id_list(&json!({"ids": ["p1"]})).is_empty());
    }

    #[test]
    fn test_normalize_skips_non_string_array_items() {
        let value = json!(["p1", 7, null, "p2"]);
        assert_eq!(permission_id_list(&value), vec!["p1", "p2"]);
    }

    #[test]
    fn test_distribute_names_per_row() {
        let activity_a = Uuid::new_v4();
        let activity_b = Uuid::new_v4();
        let rows = vec![
            (activity_a, "A".to_string(), json!(["p1", "p2"])),
            (activity_b, "B".to_string(), json!(["p3"])),
        ];

        let names_by_id: HashMap<String, String> = [
            ("p1".to_string(), "VIEW".to_string()),
            ("p2".to_string(), "EDIT".to_string()),
            ("p3".to_string(), "VIEW".to_string()),
        ]
        .into_iter()
        .collect();

        let resolved = distribute_names(&rows, &names_by_id);

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].activity_name, "A");
        assert_eq!(resolved[0].permission_names, vec!["VIEW", "EDIT"]);
        assert_eq!(resolved[1].activity_name, "B");
        assert_eq!(resolved[1].permission_names, vec!["VIEW"]);
    }

    #[test]
    fn test_distribute_drops_unresolvable_ids_silently() {
        let activity = Uuid::new_v4();
        let rows = vec![(activity, "A".to_string(), json!(["p1", "ghost"]))];
        let names_by_id: HashMap<String, String> =
            [("p1".to_string(), "VIEW".to_string())].into_iter().collect();

        let resolved = distribute_names(&rows, &names_by_id);
        assert_eq!(resolved[0].permission_names, vec!["VIEW"]);
    }

    #[test]
    fn test_distribute_legacy_comma_rows() {
        let activity = Uuid::new_v4();
        let rows = vec![(activity, "A".to_string(), json!("p1,p2"))];
        let names_by_id: HashMap<String, String> = [
            ("p1".to_string(), "VIEW".to_string()),
            ("p2".to_string(), "DELETE".to_string()),
        ]
        .into_iter()
        .collect();

        let resolved = distribute_names(&rows, &names_by_id);
        assert_eq!(resolved[0].permission_names, vec!["VIEW", "DELETE"]);
    }
}
