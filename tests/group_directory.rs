use tg_agent_bot::{
    db::dao::NewMember,
    error::AppError,
    services::{GroupService, ServiceContext},
    test_helpers::memory_db,
};
use uuid::Uuid;

fn member(telegram_id: i64, username: &str) -> NewMember {
    NewMember {
        telegram_id,
        username: Some(username.to_string()),
        first_name: None,
        last_name: None,
    }
}

async fn groups_with_members() -> GroupService {
    let db = memory_db().await;
    let groups = ServiceContext::new(&db).group();
    groups.create_member(member(1, "ann")).await.expect("member");
    groups.create_member(member(2, "ben")).await.expect("member");
    groups
}

#[tokio::test]
async fn duplicate_member_is_a_conflict() {
    let groups = groups_with_members().await;

    let err = groups
        .create_member(member(1, "ann-again"))
        .await
        .expect_err("member exists");

    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn create_group_adds_known_members_only() {
    let groups = groups_with_members().await;

    let created = groups
        .create_group("math", Some("algebra club"), &[1, 2, 99])
        .await
        .expect("create group");

    assert_eq!(created.members_added, 2);
    let detail = groups.group_by_name("math").await.expect("detail");
    let ids: Vec<i64> = detail.members.iter().map(|m| m.telegram_id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(detail.group.description.as_deref(), Some("algebra club"));
}

#[tokio::test]
async fn group_names_are_unique() {
    let groups = groups_with_members().await;
    groups.create_group("math", None, &[]).await.expect("first");

    let err = groups
        .create_group("math", None, &[])
        .await
        .expect_err("name taken");

    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn membership_changes_are_idempotent() {
    let groups = groups_with_members().await;
    let group_id = groups
        .create_group("math", None, &[])
        .await
        .expect("group")
        .group
        .id;

    assert!(groups.add_member_to_group(group_id, 1).await.expect("add"));
    assert!(groups.add_member_to_group(group_id, 1).await.expect("add again"));
    assert!(!groups.add_member_to_group(group_id, 42).await.expect("unknown member"));
    assert!(!groups.add_member_to_group(Uuid::new_v4(), 1).await.expect("unknown group"));

    assert!(groups.remove_member_from_group(group_id, 1).await.expect("remove"));
    assert!(!groups.remove_member_from_group(group_id, 1).await.expect("remove again"));
}

#[tokio::test]
async fn deleting_a_group_keeps_its_members() {
    let groups = groups_with_members().await;
    let group_id = groups
        .create_group("math", None, &[1, 2])
        .await
        .expect("group")
        .group
        .id;

    groups.delete_group(group_id).await.expect("delete");

    let err = groups.group_by_id(group_id).await.expect_err("group is gone");
    assert!(matches!(err, AppError::NotFound(_)));
    let members = groups.list_members().await.expect("members");
    assert_eq!(members.len(), 2);
    assert!(members.iter().all(|m| m.groups_count == 0));
    assert!(matches!(
        groups.delete_group(group_id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn listings_report_counts() {
    let groups = groups_with_members().await;
    groups.create_group("math", None, &[1, 2]).await.expect("group");
    groups.create_group("art", None, &[1]).await.expect("group");

    let listed = groups.list_groups().await.expect("groups");
    let summary: Vec<(String, u64)> = listed
        .into_iter()
        .map(|g| (g.group.name, g.members_count))
        .collect();
    assert_eq!(summary, vec![("art".to_string(), 1), ("math".to_string(), 2)]);

    let ann = groups.member_detail(1).await.expect("ann");
    let names: Vec<String> = ann.groups.into_iter().map(|g| g.name).collect();
    assert_eq!(names, vec!["art".to_string(), "math".to_string()]);
}
