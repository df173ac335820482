#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    routing::get,
};
use querycrate::{
    EntitySchema, FieldDef, FieldKind, Junction, Page, PaginateConfig, PaginateParams, QueryError, RelationDef,
    Repository, SchemaRegistry,
};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr};
use sea_orm_migration::prelude::*;
use serde_json::Value;

pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let db = Database::connect("sqlite::memory:").await?;

    // Run migrations
    Migrator::up(&db, None).await?;
    seed(&db).await?;

    Ok(db)
}

/// Five users across two departments (one user has none), three roles and
/// three permissions. Bob is inactive.
async fn seed(db: &DatabaseConnection) -> Result<(), DbErr> {
    db.execute_unprepared(
        "INSERT INTO ms_departments (id, name, is_active, created_at, manager_id) VALUES
            (1, 'Sales', 1, '2024-01-01T09:00:00+00:00', 1),
            (2, 'Ops', 1, '2024-01-02T09:00:00+00:00', 3),
            (3, 'Research', 0, '2024-01-03T09:00:00+00:00', NULL)",
    )
    .await?;
    db.execute_unprepared(
        "INSERT INTO users (id, uid, email, first_name, last_name, department_id, is_active, created_at) VALUES
            (1, 'a1f0c3de-0000-4000-8000-000000000001', 'jane@example.com', 'Jane', 'Doe', 1, 1, '2024-01-01T10:00:00+00:00'),
            (2, 'a1f0c3de-0000-4000-8000-000000000002', 'john@example.com', 'John', 'Smith', 1, 1, '2024-01-02T10:00:00+00:00'),
            (3, 'a1f0c3de-0000-4000-8000-000000000003', 'alice@ops.io', 'Alice', 'Jones', 2, 1, '2024-01-03T10:00:00+00:00'),
            (4, 'a1f0c3de-0000-4000-8000-000000000004', 'bob@ops.io', 'Bob', 'Brown', 2, 0, '2024-01-04T10:00:00+00:00'),
            (5, 'a1f0c3de-0000-4000-8000-000000000005', 'carol@example.com', 'Carol', 'White', NULL, 1, '2024-01-05T10:00:00+00:00')",
    )
    .await?;
    db.execute_unprepared(
        "INSERT INTO roles (id, name, is_default) VALUES (1, 'admin', 0), (2, 'viewer', 1), (3, 'editor', 0)",
    )
    .await?;
    db.execute_unprepared("INSERT INTO permissions (id, value) VALUES (1, 'read'), (2, 'write'), (3, 'delete')")
        .await?;
    db.execute_unprepared("INSERT INTO user_roles (user_id, role_id) VALUES (1, 1), (1, 2), (2, 2), (3, 3), (3, 2)")
        .await?;
    db.execute_unprepared(
        "INSERT INTO role_permissions (role_id, permission_id) VALUES (1, 1), (1, 2), (1, 3), (2, 1), (3, 1), (3, 2)",
    )
    .await?;
    Ok(())
}

pub fn registry() -> Arc<SchemaRegistry> {
    let department = EntitySchema::new("Department", "ms_departments", FieldDef::new("id", "id", FieldKind::Int))
        .with_column("name", FieldKind::Text)
        .with_field("isActive", "is_active", FieldKind::Int)
        .with_field("createdAt", "created_at", FieldKind::DateTime)
        .with_field("managerId", "manager_id", FieldKind::Int)
        .with_relation(RelationDef::belongs_to("manager", "User", "manager_id", "id"))
        .with_relation(RelationDef::has_many("members", "User", "id", "department_id"))
        .with_default_sort("createdAt");

    // sqlite stores the uuid as text
    let user = EntitySchema::new("User", "users", FieldDef::new("id", "id", FieldKind::Int))
        .with_column("uid", FieldKind::Text)
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
        .with_active_flag("isActive", 1);

    let role = EntitySchema::new("Role", "roles", FieldDef::new("id", "id", FieldKind::Int))
        .with_column("name", FieldKind::Text)
        .with_field("isDefault", "is_default", FieldKind::Bool)
        .with_relation(RelationDef::many_to_many(
            "permissions",
            "Permission",
            Junction::new("role_permissions", "role_id", "permission_id"),
        ));

    let permission = EntitySchema::new("Permission", "permissions", FieldDef::new("id", "id", FieldKind::Int))
        .with_column("value", FieldKind::Text);

    Arc::new(SchemaRegistry::new([department, user, role, permission]).expect("test schemas are valid"))
}

pub fn users() -> Repository {
    Repository::new(registry(), "User").expect("User schema is registered")
}

/// Ids of the returned items, in page order.
pub fn ids(page: &Page<Value>) -> Vec<i64> {
    page.items.iter().filter_map(|item| item["id"].as_i64()).collect()
}

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub users: Arc<Repository>,
    pub config: PaginateConfig,
}

async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<PaginateParams>,
) -> Result<Page<Value>, QueryError> {
    let request = params.into_request(&state.config).with_links("/users");
    state.users.paginate(&state.db, &request).await
}

pub fn setup_test_app(db: DatabaseConnection) -> Router {
    let state = AppState {
        db,
        users: Arc::new(users()),
        config: PaginateConfig::default(),
    };
    Router::new().route("/users", get(list_users)).with_state(state)
}

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(CreateDirectoryTables)]
    }
}

pub struct CreateDirectoryTables;

#[async_trait::async_trait]
impl MigrationName for CreateDirectoryTables {
    fn name(&self) -> &'static str {
        "m20240101_000001_create_directory_tables"
    }
}

fn id_column() -> ColumnDef {
    ColumnDef::new(Alias::new("id")).integer().not_null().primary_key().to_owned()
}

fn link_table(name: &str, left: &str, right: &str) -> TableCreateStatement {
    Table::create()
        .table(Alias::new(name))
        .if_not_exists()
        .col(ColumnDef::new(Alias::new(left)).integer().not_null())
        .col(ColumnDef::new(Alias::new(right)).integer().not_null())
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for CreateDirectoryTables {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("ms_departments"))
                    .if_not_exists()
                    .col(id_column())
                    .col(ColumnDef::new(Alias::new("name")).string().not_null())
                    .col(ColumnDef::new(Alias::new("is_active")).integer().not_null().default(1))
                    .col(ColumnDef::new(Alias::new("created_at")).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Alias::new("manager_id")).integer().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("users"))
                    .if_not_exists()
                    .col(id_column())
                    .col(ColumnDef::new(Alias::new("uid")).string().not_null())
                    .col(ColumnDef::new(Alias::new("email")).string().not_null())
                    .col(ColumnDef::new(Alias::new("first_name")).string().not_null())
                    .col(ColumnDef::new(Alias::new("last_name")).string().not_null())
                    .col(ColumnDef::new(Alias::new("department_id")).integer().null())
                    .col(ColumnDef::new(Alias::new("is_active")).integer().not_null().default(1))
                    .col(ColumnDef::new(Alias::new("created_at")).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("roles"))
                    .if_not_exists()
                    .col(id_column())
                    .col(ColumnDef::new(Alias::new("name")).string().not_null())
                    .col(ColumnDef::new(Alias::new("is_default")).boolean().not_null().default(false))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("permissions"))
                    .if_not_exists()
                    .col(id_column())
                    .col(ColumnDef::new(Alias::new("value")).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager.create_table(link_table("user_roles", "user_id", "role_id")).await?;
        manager
            .create_table(link_table("role_permissions", "role_id", "permission_id"))
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in ["role_permissions", "user_roles", "permissions", "roles", "users", "ms_departments"] {
            manager.drop_table(Table::drop().table(Alias::new(table)).to_owned()).await?;
        }
        Ok(())
    }
}
