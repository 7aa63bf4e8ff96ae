use drivelane_application::{
    CreateRoleInput, DirectoryRepository, NewDirectoryUser, PermissionLookup,
};
use drivelane_domain::{EmailAddress, Permission};

use super::InMemoryDirectoryRepository;

fn email(value: &str) -> EmailAddress {
    EmailAddress::new(value).unwrap_or_else(|_| unreachable!())
}

async fn seeded_role(repository: &InMemoryDirectoryRepository, name: &str) -> String {
    let role = repository
        .create_role(CreateRoleInput {
            name: name.to_owned(),
            description: None,
        })
        .await;
    role.map(|role| role.role_id)
        .unwrap_or_else(|_| unreachable!())
}

async fn seeded_user(repository: &InMemoryDirectoryRepository, address: &str) -> String {
    let user = repository
        .create_user(NewDirectoryUser {
            email: email(address),
            display_name: address.to_owned(),
            username: address.to_owned(),
        })
        .await;
    user.map(|user| user.user_id)
        .unwrap_or_else(|_| unreachable!())
}

#[tokio::test]
async fn duplicate_role_names_conflict() {
    let repository = InMemoryDirectoryRepository::new();
    seeded_role(&repository, "ops").await;

    let duplicate = repository
        .create_role(CreateRoleInput {
            name: "ops".to_owned(),
            description: None,
        })
        .await;

    assert!(duplicate.is_err());
}

#[tokio::test]
async fn assignments_are_deduplicated() {
    let repository = InMemoryDirectoryRepository::new();
    let role_id = seeded_role(&repository, "ops").await;
    let user_id = seeded_user(&repository, "sm@dealer.in").await;

    for _ in 0..2 {
        let assigned = repository.assign_role(&user_id, &role_id).await;
        assert!(assigned.is_ok());
    }

    let assignments = repository.list_role_assignments().await;
    assert_eq!(assignments.ok().map(|assignments| assignments.len()), Some(1));
}

#[tokio::test]
async fn lookup_unions_grants_across_roles() {
    let repository = InMemoryDirectoryRepository::new();
    let ops = seeded_role(&repository, "ops").await;
    let reporting = seeded_role(&repository, "reporting").await;
    let user_id = seeded_user(&repository, "sm@dealer.in").await;

    for (role_id, permission) in [
        (&ops, Permission::Upload),
        (&ops, Permission::Overview),
        (&reporting, Permission::MisReport),
        (&reporting, Permission::Overview),
    ] {
        let linked = repository.add_role_permission(role_id, permission).await;
        assert!(linked.is_ok());
    }
    for role_id in [&ops, &reporting] {
        let assigned = repository.assign_role(&user_id, role_id).await;
        assert!(assigned.is_ok());
    }

    let lookup = repository
        .lookup_permissions_by_email(&email("sm@dealer.in"))
        .await;

    assert!(lookup.is_ok());
    if let Ok(PermissionLookup::Configured(mut grants)) = lookup {
        grants.sort();
        assert_eq!(
            grants,
            vec![Permission::Overview, Permission::Upload, Permission::MisReport]
        );
    } else {
        unreachable!();
    }
}

#[tokio::test]
async fn role_deletion_cascades_over_assignments() {
    let repository = InMemoryDirectoryRepository::new();
    let role_id = seeded_role(&repository, "ops").await;
    let user_id = seeded_user(&repository, "sm@dealer.in").await;
    let assigned = repository.assign_role(&user_id, &role_id).await;
    assert!(assigned.is_ok());

    let deleted = repository.delete_role(&role_id).await;
    assert!(deleted.is_ok());

    let assignments = repository.list_role_assignments().await;
    assert_eq!(assignments.ok().map(|assignments| assignments.len()), Some(0));

    // The user is still known, so the lookup reports an explicit lockout.
    let lookup = repository
        .lookup_permissions_by_email(&email("sm@dealer.in"))
        .await;
    assert!(matches!(
        lookup,
        Ok(PermissionLookup::Configured(ref grants)) if grants.is_empty()
    ));
}

#[tokio::test]
async fn unknown_users_resolve_unconfigured() {
    let repository = InMemoryDirectoryRepository::new();

    let lookup = repository
        .lookup_permissions_by_email(&email("ghost@dealer.in"))
        .await;

    assert!(matches!(lookup, Ok(PermissionLookup::NotConfigured)));
}
