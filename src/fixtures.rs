//! Shared schemas for unit tests: users, departments, roles and permissions.

use std::sync::Arc;

use crate::schema::{EntitySchema, FieldDef, FieldKind, Junction, RelationDef, SchemaRegistry};

pub fn department() -> EntitySchema {
    EntitySchema::new("Department", "ms_departments", FieldDef::new("id", "id", FieldKind::Int))
        .with_column("name", FieldKind::Text)
        .with_field("isActive", "is_active", FieldKind::Int)
        .with_field("createdAt", "created_at", FieldKind::DateTime)
        .with_field("managerId", "manager_id", FieldKind::Int)
        .with_relation(RelationDef::belongs_to("manager", "User", "manager_id", "id"))
        .with_relation(RelationDef::has_many("members", "User", "id", "department_id"))
        .with_default_sort("createdAt")
}

pub fn user() -> EntitySchema {
    EntitySchema::new("User", "users", FieldDef::new("id", "id", FieldKind::Int))
        .with_column("uid", FieldKind::Uuid)
        .with_column("email", FieldKind::Text)
        .with_field("firstName", "first_name", FieldKind::Text)
        .with_field("lastName", "last_name", FieldKind::Text)
        .with_field("departmentId", "department_id", FieldKind::Int)
        .with_field("isActive", "is_active", FieldKind::Int)
        .with_field("createdAt", "created_at", FieldKind::DateTime)
        .with_relation(RelationDef::belongs_to("department", "Department", "department_id", "id"))
        .with_relation(RelationDef::many_to_many(
            "roles",
            "Role",
            Junction::new("user_roles", "user_id", "role_id"),
        ))
        .with_default_sort("createdAt")
        .with_active_flag("isActive", 1)
}

pub fn role() -> EntitySchema {
    EntitySchema::new("Role", "roles", FieldDef::new("id", "id", FieldKind::Int))
        .with_column("name", FieldKind::Text)
        .with_field("isDefault", "is_default", FieldKind::Bool)
        .with_relation(RelationDef::many_to_many(
            "permissions",
            "Permission",
            Junction::new("role_permissions", "role_id", "permission_id"),
        ))
}

pub fn permission() -> EntitySchema {
    EntitySchema::new("Permission", "permissions", FieldDef::new("id", "id", FieldKind::Int))
        .with_column("value", FieldKind::Text)
}

pub fn registry() -> Arc<SchemaRegistry> {
    Arc::new(SchemaRegistry::new([department(), user(), role(), permission()]).expect("fixture schemas are valid"))
}
