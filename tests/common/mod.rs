#![allow(dead_code)]

use std::sync::Arc;

use mentorlink::{AppState, clock::SteppingClock, config::Config, model::Role};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use time::{Duration, macros::datetime};
use uuid::Uuid;

pub struct Harness {
    pub state: AppState,
    pub alice: Uuid,
    pub bob: Uuid,
    pub carol: Uuid,
    pub mentor: Uuid,
    pub other_mentor: Uuid,
    pub admin: Uuid,
}

pub async fn pool() -> SqlitePool {
    // one connection keeps every query on the same in-memory database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!().run(&db_pool).await.unwrap();
    db_pool
}

pub async fn add_profile(db_pool: &SqlitePool, role: Role, display_name: &str) -> Uuid {
    let id = Uuid::now_v7();
    sqlx::query("INSERT INTO profiles (id,role,display_name) VALUES (?,?,?)")
        .bind(id.to_string())
        .bind(role.as_str())
        .bind(display_name)
        .execute(db_pool)
        .await
        .unwrap();
    id
}

pub async fn harness() -> Harness {
    harness_with(Config::new("sqlite::memory:")).await
}

pub async fn harness_with(config: Config) -> Harness {
    let db_pool = pool().await;

    let alice = add_profile(&db_pool, Role::Student, "Alice").await;
    let bob = add_profile(&db_pool, Role::Student, "Bob").await;
    let carol = add_profile(&db_pool, Role::Student, "Carol").await;
    let mentor = add_profile(&db_pool, Role::Alumni, "Maya").await;
    let other_mentor = add_profile(&db_pool, Role::Alumni, "Omar").await;
    let admin = add_profile(&db_pool, Role::Admin, "Ada").await;

    let clock = Arc::new(SteppingClock::new(
        datetime!(2024-03-01 09:00 UTC),
        Duration::seconds(1),
    ));
    let state = AppState::with_clock(db_pool, &config, clock);

    Harness {
        state,
        alice,
        bob,
        carol,
        mentor,
        other_mentor,
        admin,
    }
}
