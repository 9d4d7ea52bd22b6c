/// Team lifecycle tests
///
/// Team creation defaults, cascading deletion with rollback, archiving and
/// the permission rules around them.

mod common;

use chrono::Utc;
use common::{user, TestContext, OTHER_TENANT, TENANT};
use datav_shared::auth::AclError;
use datav_shared::models::team::DATASOURCE_TESTDATA;
use datav_shared::models::{AuditAction, Dashboard, Role, VisibleTo};
use datav_shared::services::team::home_dashboard_id;
use datav_shared::services::CreateTeam;
use datav_shared::store::Store;
use datav_shared::CoreError;
use serde_json::json;

#[tokio::test]
async fn test_create_team_seeds_defaults() {
    let ctx = TestContext::new().await;
    let alice = user(1, "alice");
    let team = ctx.create_team(TENANT, "ops", &alice).await;

    assert_eq!(team.name, "ops");
    assert_eq!(team.tenant_id, TENANT);
    assert_eq!(team.created_by, alice.id);
    assert!(!team.is_public);

    let member = ctx.store.team_member(team.id, alice.id).await.unwrap().unwrap();
    assert_eq!(member.role, Role::SuperAdmin);
    assert!(member.role.is_admin());

    let datasources = ctx.teams.datasources(team.id, Some(&alice)).await.unwrap();
    assert_eq!(datasources.len(), 1);
    assert_eq!(datasources[0].name, "TestData");
    assert_eq!(datasources[0].kind, DATASOURCE_TESTDATA);

    let home_id = home_dashboard_id(team.id);
    let home = ctx.dashboards.fetch(&home_id, Some(&alice)).await.unwrap();
    assert_eq!(home.owned_by, team.id);
    assert_eq!(home.visible_to, VisibleTo::Team);
    assert_eq!(home.created_by, alice.id);

    let menu = ctx.teams.side_menu(team.id, Some(&alice)).await.unwrap();
    assert_eq!(menu.team_name, "ops");
    assert_eq!(menu.data.len(), 1);
    assert_eq!(menu.data[0].title, "Home");
    assert_eq!(menu.data[0].url, "/home");
    assert_eq!(menu.data[0].icon.as_deref(), Some("FaHome"));
    assert_eq!(menu.data[0].dashboard_id, home_id);
}

#[tokio::test]
async fn test_create_team_requires_tenant_membership() {
    let ctx = TestContext::new().await;
    let mallory = user(3, "mallory");

    let result = ctx
        .teams
        .create(
            TENANT,
            CreateTeam {
                name: "intruders".to_string(),
                brief: String::new(),
            },
            &mallory,
        )
        .await;

    assert!(matches!(
        result,
        Err(CoreError::PermissionDenied(AclError::NotTenantMember))
    ));
}

#[tokio::test]
async fn test_duplicate_team_name_conflicts() {
    let ctx = TestContext::new().await;
    let alice = user(1, "alice");
    let bob = user(2, "bob");
    ctx.create_team(TENANT, "ops", &alice).await;
    ctx.store.add_tenant_member(TENANT, bob.id, Role::Viewer).await;

    let duplicate = ctx
        .teams
        .create(
            TENANT,
            CreateTeam {
                name: "ops".to_string(),
                brief: String::new(),
            },
            &bob,
        )
        .await;
    assert!(matches!(duplicate, Err(CoreError::Conflict(_))));

    // the failed attempt left no membership behind
    assert!(ctx.store.member_team_ids(TENANT, bob.id).await.unwrap().is_empty());

    // same name in another tenant is fine
    let other = ctx.create_team(OTHER_TENANT, "ops", &bob).await;
    assert_eq!(other.tenant_id, OTHER_TENANT);
}

#[tokio::test]
async fn test_create_team_rejects_empty_name() {
    let ctx = TestContext::new().await;
    let alice = user(1, "alice");
    ctx.store.add_tenant_member(TENANT, alice.id, Role::Admin).await;

    let result = ctx
        .teams
        .create(
            TENANT,
            CreateTeam {
                name: String::new(),
                brief: String::new(),
            },
            &alice,
        )
        .await;
    assert!(matches!(result, Err(CoreError::Validation(_))));
}

#[tokio::test]
async fn test_viewer_cannot_edit_team_dashboards() {
    let ctx = TestContext::new().await;
    let alice = user(1, "alice");
    let viewer = user(2, "viewer");
    let team = ctx.create_team(TENANT, "ops", &alice).await;
    ctx.join(&team, &viewer, Role::Viewer).await;

    let home_id = home_dashboard_id(team.id);
    assert!(ctx.dashboards.fetch(&home_id, Some(&viewer)).await.is_ok());
    assert!(matches!(
        ctx.dashboards.delete(&home_id, &viewer).await,
        Err(CoreError::PermissionDenied(AclError::NotTeamAdmin))
    ));
}

#[tokio::test]
async fn test_delete_team_removes_every_dependent_row() {
    let ctx = TestContext::new().await;
    let alice = user(1, "alice");
    let bob = user(2, "bob");
    let team = ctx.create_team(TENANT, "ops", &alice).await;
    ctx.join(&team, &bob, Role::Viewer).await;
    ctx.store.add_variable(team.id, "env").await;
    ctx.store.add_variable(team.id, "region").await;

    let extra = ctx.save(team.id, "Extra", VisibleTo::Team, &alice).await;
    ctx.dashboards.star(&extra, Some(&bob)).await.unwrap();

    ctx.teams.delete(team.id, &alice).await.unwrap();

    assert!(!ctx.store.team_row_exists(team.id).await);
    assert_eq!(ctx.store.team_member_count(team.id).await, 0);
    assert_eq!(ctx.store.variable_count(team.id).await, 0);
    assert!(ctx.store.team_datasources(team.id).await.unwrap().is_empty());
    assert!(!ctx.store.dashboard_exists(&extra).await);
    assert!(!ctx.store.dashboard_exists(&home_dashboard_id(team.id)).await);
    assert_eq!(ctx.store.star_count(&extra).await, 0);

    let audit = ctx.store.audit_entries().await;
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].action, AuditAction::DeleteTeam);
    assert_eq!(audit[0].target_id, team.id.to_string());
    assert_eq!(audit[0].snapshot["name"], "ops");

    assert!(matches!(
        ctx.teams.get(team.id, Some(&alice)).await,
        Err(CoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_delete_team_is_all_or_nothing() {
    let ctx = TestContext::new().await;
    let alice = user(1, "alice");
    let bob = user(2, "bob");
    let team = ctx.create_team(TENANT, "ops", &alice).await;
    ctx.join(&team, &bob, Role::Viewer).await;
    ctx.store.add_variable(team.id, "env").await;

    let first = ctx.save(team.id, "First", VisibleTo::Team, &alice).await;
    let broken = ctx.save(team.id, "Broken", VisibleTo::Team, &alice).await;
    ctx.dashboards.star(&first, Some(&bob)).await.unwrap();
    ctx.store.fail_dashboard_delete(&broken).await;

    let result = ctx.teams.delete(team.id, &alice).await;
    assert!(matches!(result, Err(CoreError::Infrastructure(_))));

    assert!(ctx.store.team_row_exists(team.id).await);
    assert_eq!(ctx.store.team_member_count(team.id).await, 2);
    assert_eq!(ctx.store.variable_count(team.id).await, 1);
    assert_eq!(ctx.store.team_datasources(team.id).await.unwrap().len(), 1);
    assert!(ctx.store.dashboard_exists(&first).await);
    assert!(ctx.store.dashboard_exists(&broken).await);
    assert!(ctx.store.dashboard_exists(&home_dashboard_id(team.id)).await);
    assert_eq!(ctx.store.star_count(&first).await, 1);
    assert!(ctx.store.audit_entries().await.is_empty());
}

#[tokio::test]
async fn test_only_team_admins_delete_teams() {
    let ctx = TestContext::new().await;
    let alice = user(1, "alice");
    let viewer = user(2, "viewer");
    let outsider = user(3, "outsider");
    let team = ctx.create_team(TENANT, "ops", &alice).await;
    ctx.join(&team, &viewer, Role::Viewer).await;

    assert!(matches!(
        ctx.teams.delete(team.id, &viewer).await,
        Err(CoreError::PermissionDenied(AclError::NotTeamAdmin))
    ));
    assert!(matches!(
        ctx.teams.delete(team.id, &outsider).await,
        Err(CoreError::PermissionDenied(AclError::NotTeamMember))
    ));
    assert!(matches!(
        ctx.teams.delete(999, &alice).await,
        Err(CoreError::NotFound(_))
    ));
    assert!(ctx.store.team_row_exists(team.id).await);
}

#[tokio::test]
async fn test_archived_team_is_invisible() {
    let ctx = TestContext::new().await;
    let alice = user(1, "alice");
    let viewer = user(2, "viewer");
    let team = ctx.create_team(TENANT, "ops", &alice).await;
    ctx.join(&team, &viewer, Role::Viewer).await;
    ctx.save(team.id, "Board", VisibleTo::Team, &alice).await;
    let status_page = ctx.save(team.id, "Status", VisibleTo::Public, &alice).await;
    assert!(ctx.dashboards.fetch(&status_page, None).await.is_ok());

    assert!(matches!(
        ctx.teams.archive(team.id, &viewer).await,
        Err(CoreError::PermissionDenied(_))
    ));

    ctx.teams.archive(team.id, &alice).await.unwrap();

    assert!(ctx.store.team_row_exists(team.id).await);
    assert!(matches!(
        ctx.teams.get(team.id, Some(&alice)).await,
        Err(CoreError::NotFound(_))
    ));
    assert!(matches!(
        ctx.teams.side_menu(team.id, Some(&alice)).await,
        Err(CoreError::NotFound(_))
    ));
    assert!(matches!(
        ctx.dashboards.team_dashboards(team.id, Some(&alice)).await,
        Err(CoreError::NotFound(_))
    ));
    assert!(ctx.dashboards.search(TENANT, Some(&alice)).await.unwrap().is_empty());
    for acting in [None, Some(&alice)] {
        assert!(matches!(
            ctx.dashboards.fetch(&status_page, acting).await,
            Err(CoreError::NotFound(_))
        ));
    }
    assert!(ctx.store.dashboard_exists(&status_page).await);
    assert!(matches!(
        ctx.teams.archive(team.id, &alice).await,
        Err(CoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_public_team_is_readable_by_anyone() {
    let ctx = TestContext::new().await;
    let alice = user(1, "alice");
    let team = ctx.create_team(TENANT, "ops", &alice).await;

    assert!(matches!(
        ctx.teams.get(team.id, None).await,
        Err(CoreError::PermissionDenied(AclError::NotTeamMember))
    ));

    ctx.store.set_team_public(team.id, true).await.unwrap();
    assert_eq!(ctx.teams.get(team.id, None).await.unwrap().name, "ops");
    assert_eq!(ctx.teams.side_menu(team.id, None).await.unwrap().data.len(), 1);
}

#[tokio::test]
async fn test_create_team_keeps_existing_home_dashboard() {
    let ctx = TestContext::new().await;
    let alice = user(1, "alice");

    // a leftover row already holds the first team's home id
    let now = Utc::now();
    let leftover = Dashboard {
        id: home_dashboard_id(1),
        title: "Leftover".to_string(),
        owned_by: 1,
        visible_to: VisibleTo::Team,
        tags: Default::default(),
        data: json!({}),
        weight: 0,
        created_by: 99,
        created: now,
        updated: now,
    };
    ctx.store
        .insert_dashboard(&leftover.encode().unwrap())
        .await
        .unwrap();

    let team = ctx.create_team(TENANT, "ops", &alice).await;
    assert_eq!(team.id, 1);

    let home = ctx
        .dashboards
        .fetch(&home_dashboard_id(team.id), Some(&alice))
        .await
        .unwrap();
    assert_eq!(home.title, "Leftover");
    assert_eq!(home.created_by, 99);

    let menu = ctx.teams.side_menu(team.id, Some(&alice)).await.unwrap();
    assert_eq!(menu.data[0].dashboard_id, home_dashboard_id(team.id));
    assert_eq!(ctx.teams.datasources(team.id, Some(&alice)).await.unwrap().len(), 1);
}
