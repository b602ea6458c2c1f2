//! Permission-id normalization and aggregate view shapes.

use serde_json::json;

use sevak::authz::{permission_id_list, permission_id_set, ActivityPermissions};

#[test]
fn current_and_legacy_shapes_normalize_identically() {
    let as_array = json!(["6f1a", "8b2c", "9d3e"]);
    let as_string = json!("6f1a,8b2c,9d3e");

    assert_eq!(permission_id_set(&as_array), permission_id_set(&as_string));
    assert_eq!(
        permission_id_list(&as_array),
        permission_id_list(&as_string)
    );
}

#[test]
fn messy_legacy_strings_are_tolerated() {
    let value = json!("  6f1a ,, 8b2c ,6f1a,  ");
    assert_eq!(permission_id_list(&value), vec!["6f1a", "8b2c"]);
}

#[test]
fn unexpected_shapes_grant_nothing() {
    assert!(permission_id_set(&json!(null)).is_empty());
    assert!(permission_id_set(&json!(true)).is_empty());
    assert!(permission_id_set(&json!(123)).is_empty());
    assert!(permission_id_set(&json!({"permission_ids": ["p1"]})).is_empty());
    assert!(permission_id_set(&json!("")).is_empty());
}

#[test]
fn aggregate_view_serializes_with_camel_case_keys() {
    let view = ActivityPermissions {
        activity_id: uuid::Uuid::new_v4(),
        activity_name: "USERS".to_string(),
        permission_names: vec!["VIEW".to_string(), "EDIT".to_string()],
    };

    let json = serde_json::to_value(&view).unwrap();
    assert!(json.get("activityId").is_some());
    assert!(json.get("activityName").is_some());
    assert_eq!(json["permissionNames"], json!(["VIEW", "EDIT"]));
}
