mod common;

use common::{ sqlite_db, AdminUser, Profile, Settings, User };
use generic_repo::{ DataStore, Filter, InMemoryStore, Repository, Value };

fn admin() -> AdminUser {
    AdminUser {
        user: User::new("adm1", "Grace", "Hopper"),
        role: "admin".to_string(),
    }
}

fn profile() -> Profile {
    Profile {
        id: 7,
        display_name: "grace".to_string(),
        settings: Some(Settings {
            theme: "dark".to_string(),
            notifications: true,
        }),
        tags: vec!["navy".to_string(), "cobol".to_string()],
    }
}

#[test]
fn persistable_row_keeps_declared_fields_only() {
    let repo: Repository<User> = Repository::new("user", "id_user").unwrap();

    let row = repo.persistable_row(&admin(), false);
    assert_eq!(row.len(), 3);
    assert!(!row.contains("role"));

    let without_key = repo.persistable_row(&admin(), true);
    assert!(!without_key.contains("id_user"));
    assert_eq!(without_key.get("first_name"), Some(&Value::from("Grace")));
}

#[tokio::test]
async fn extended_instance_is_stored_without_extra_field() {
    let store = InMemoryStore::new();
    let repo: Repository<User> = Repository::new("user", "id_user").unwrap();

    repo.upsert(&store, &admin()).await.unwrap();

    let raw = store.select("user", &Filter::new()).await.unwrap();
    assert_eq!(raw.len(), 1);
    assert!(!raw[0].contains("role"));

    let user = repo.get(&store, &Filter::by("id_user", "adm1")).await.unwrap().unwrap();
    assert_eq!(user.get_name(), "Grace Hopper");
}

#[tokio::test]
async fn extended_instance_fits_the_declared_sqlite_table() {
    // The table has no `role` column; writing it would fail
    let db = sqlite_db().await;
    let repo: Repository<User> = Repository::new("user", "id_user").unwrap();

    repo.upsert(&db, &admin()).await.unwrap();

    let mut updated = admin();
    updated.user.first_name = "Amazing Grace".to_string();
    updated.role = "superuser".to_string();
    repo.upsert(&db, &updated).await.unwrap();

    let users = repo.get_all(&db, None).await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].get_name(), "Amazing Grace Hopper");
}

#[tokio::test]
async fn structured_fields_round_trip_through_sqlite() {
    let db = sqlite_db().await;
    let repo: Repository<Profile> = Repository::new("profile", "id").unwrap();

    repo.upsert(&db, &profile()).await.unwrap();

    let raw = db.first("profile", &Filter::by("id", 7), &[]).await.unwrap().unwrap();
    assert_eq!(raw.get("tags"), Some(&Value::from(r#"["navy","cobol"]"#)));

    let stored = repo.get(&db, &Filter::by("id", 7)).await.unwrap().unwrap();
    assert_eq!(stored, profile());
}

#[tokio::test]
async fn structured_fields_round_trip_through_memory() {
    let store = InMemoryStore::new();
    let repo: Repository<Profile> = Repository::new("profile", "id").unwrap();

    let mut without_settings = profile();
    without_settings.settings = None;
    repo.upsert(&store, &without_settings).await.unwrap();

    let stored = repo.get(&store, &Filter::by("id", 7)).await.unwrap().unwrap();
    assert_eq!(stored, without_settings);
}
