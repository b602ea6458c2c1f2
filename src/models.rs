use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Queryable, Selectable, Serialize, Clone)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub phone: Option<String>,
    pub role_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub role_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::roles)]
pub struct Role {
    pub id: Uuid,
    #[schema(example = "coordinator")]
    pub name: String,
    #[schema(example = "Manages sevaks and locations")]
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::roles)]
pub struct NewRole {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::activities)]
pub struct Activity {
    pub id: Uuid,
    #[schema(example = "USERS")]
    pub name: String,
    #[schema(example = "Sevak administration screens")]
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::activities)]
pub struct NewActivity {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::permissions)]
pub struct Permission {
    pub id: Uuid,
    #[schema(example = "VIEW")]
    pub name: String,
    pub status: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::permissions)]
pub struct NewPermission {
    pub name: String,
    pub status: bool,
}

/// Role↔activity mapping row. `permission_ids` is denormalized JSONB: either
/// an array of permission-id strings or a legacy comma-joined string. It is
/// normalized at the resolver boundary, see [`crate::authz::permission_id_set`].
#[derive(Debug, Queryable, Selectable, Serialize, Clone)]
#[diesel(table_name = crate::schema::role_activity_permissions)]
pub struct RoleActivityPermission {
    pub id: Uuid,
    pub role_id: Uuid,
    pub activity_id: Uuid,
    pub permission_ids: serde_json::Value,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::role_activity_permissions)]
pub struct NewRoleActivityPermission {
    pub role_id: Uuid,
    pub activity_id: Uuid,
    pub permission_ids: serde_json::Value,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::locations)]
pub struct Location {
    pub id: Uuid,
    #[schema(example = "Akshar Hall")]
    pub name: String,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::locations)]
pub struct NewLocation {
    pub name: String,
    pub address: Option<String>,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::amavasyas)]
pub struct Amavasya {
    pub id: Uuid,
    #[schema(example = 3)]
    pub month: i32,
    #[schema(example = 2025)]
    pub year: i32,
    pub start_date: NaiveDateTime,
    pub end_date: Option<NaiveDateTime>,
    #[schema(example = "06:00")]
    pub start_time: Option<String>,
    #[schema(example = "20:00")]
    pub end_time: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::amavasyas)]
pub struct NewAmavasya {
    pub month: i32,
    pub year: i32,
    pub start_date: NaiveDateTime,
    pub end_date: Option<NaiveDateTime>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::amavasya_user_locations)]
pub struct AmavasyaUserLocation {
    pub id: Uuid,
    pub amavasya_id: Uuid,
    pub user_id: Uuid,
    pub location_id: Uuid,
    pub note: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::amavasya_user_locations)]
pub struct NewAmavasyaUserLocation {
    pub amavasya_id: Uuid,
    pub user_id: Uuid,
    pub location_id: Uuid,
    pub note: Option<String>,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = crate::schema::refresh_tokens)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::refresh_tokens)]
pub struct NewRefreshToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: NaiveDateTime,
}
