//! Login accounts.
//!
//! Accounts are `Admin` (administrator role) or `User` (standard role) nodes keyed by login name.
//! Each carries a salted password digest and a `person_id` mapping it to a clinical person, so the
//! link to a doctor or patient survives a change of login name. Accounts created without a mapping
//! (such as the bootstrap seeds) map to their own login name.

use crate::graph::{GraphData, GraphStore, Label, Node, NodeRef};
use crate::password::{verify_stored, PasswordDigest};
use crate::schema::object;
use crate::session::{Role, Session};
use crate::{ClinicError, ClinicResult};
use clinic_types::{EntityId, NonEmptyText};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Which kind of account to create.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum AccountKind {
    Admin,
    User,
}

impl AccountKind {
    fn label(self) -> Label {
        match self {
            Self::Admin => Label::Admin,
            Self::User => Label::User,
        }
    }

    fn role(self) -> Role {
        match self {
            Self::Admin => Role::Administrator,
            Self::User => Role::Standard,
        }
    }

    fn for_role(role: Role) -> Self {
        match role {
            Role::Administrator => Self::Admin,
            Role::Standard => Self::User,
        }
    }
}

/// An account as listed to administrators. Password digests are never returned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AccountRow {
    pub name: String,
    pub kind: AccountKind,
    pub person_id: String,
}

/// Parameters for an administrator-created account.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewAccount {
    pub kind: AccountKind,
    pub name: EntityId,
    pub password: NonEmptyText,
    /// Doctor or patient id the account acts as; defaults to the login name.
    #[serde(default)]
    pub person_id: Option<EntityId>,
}

/// Account service.
#[derive(Clone, Debug)]
pub struct AccountService {
    store: Arc<GraphStore>,
}

impl AccountService {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }

    /// Authenticates a login, checking administrator accounts before standard ones.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::InvalidCredentials` when no account of that name accepts the
    /// password.
    pub fn login(&self, name: &str, password: &str) -> ClinicResult<Session> {
        let name = name.trim();
        let role = self.store.read(|g| {
            for kind in [AccountKind::Admin, AccountKind::User] {
                let Some(node) = g.node(&NodeRef::new(kind.label(), name)) else {
                    continue;
                };
                let stored = node.str_prop("password").unwrap_or_default();
                match verify_stored(stored, password) {
                    Ok(true) => return Ok(Some(kind.role())),
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(account = name, kind = ?kind, error = %e, "unreadable password digest");
                    }
                }
            }
            Ok(None)
        })?;

        match role {
            Some(role) => {
                tracing::info!(login = name, %role, "login succeeded");
                Ok(Session::new(name, role))
            }
            None => {
                tracing::info!(login = name, "login failed");
                Err(ClinicError::InvalidCredentials)
            }
        }
    }

    /// Self-registration of a standard account mapped to a person with the same id as the name.
    ///
    /// # Errors
    ///
    /// - `ClinicError::InvalidInput` if the passwords differ or are empty, or the name is invalid
    /// - `ClinicError::AlreadyExists` if the name is taken, or is the id of an existing doctor or
    ///   patient (those accounts are created by an administrator)
    pub fn register_user(&self, name: &str, password: &str, confirm: &str) -> ClinicResult<()> {
        let name = EntityId::new(name)?;
        if password.is_empty() {
            return Err(ClinicError::InvalidInput("password must not be empty".into()));
        }
        if password != confirm {
            return Err(ClinicError::InvalidInput("passwords do not match".into()));
        }

        self.store.write(|g| {
            ensure_not_clinical_id(g, name.as_str())?;
            insert_account(g, AccountKind::User, name.as_str(), password, name.as_str())
        })?;
        tracing::info!(login = %name, "registered user account");
        Ok(())
    }

    /// Creates an account on behalf of an administrator.
    pub fn create_account(&self, session: &Session, new: NewAccount) -> ClinicResult<()> {
        session.require_admin()?;

        let person_id = new.person_id.as_ref().unwrap_or(&new.name);
        self.store.write(|g| {
            insert_account(
                g,
                new.kind,
                new.name.as_str(),
                new.password.as_str(),
                person_id.as_str(),
            )
        })?;
        tracing::info!(
            login = %new.name,
            kind = ?new.kind,
            person_id = %person_id,
            by = %session.login_name,
            "created account"
        );
        Ok(())
    }

    /// The person an account acts as, or `None` when no account has that name.
    pub fn person_id(&self, name: &str) -> ClinicResult<Option<String>> {
        self.store.read(|g| Ok(account_person(g, name)))
    }

    /// Changes the caller's own login name and/or password, keeping the person mapping.
    ///
    /// Returns the session to use from now on. With nothing to change this is a no-op.
    ///
    /// # Errors
    ///
    /// - `ClinicError::AlreadyExists` if the new name is taken
    /// - `ClinicError::NotFound` if the session's account no longer exists
    pub fn change_own_credentials(
        &self,
        session: &Session,
        new_name: Option<&str>,
        new_password: Option<&str>,
    ) -> ClinicResult<Session> {
        let new_name = new_name
            .map(str::trim)
            .filter(|n| !n.is_empty() && *n != session.login_name)
            .map(EntityId::new)
            .transpose()?;
        let new_password = new_password.filter(|p| !p.is_empty());
        if new_name.is_none() && new_password.is_none() {
            return Ok(session.clone());
        }

        let kind = AccountKind::for_role(session.role);
        let current = NodeRef::new(kind.label(), &session.login_name);

        self.store.write(|g| {
            // Freeze the mapping before the name changes.
            let person = person_of(g.require(&current)?);
            let mut props = object(json!({ "person_id": person }));
            if let Some(password) = new_password {
                props.insert(
                    "password".into(),
                    Value::from(PasswordDigest::new(password).to_string()),
                );
            }
            g.set_properties(&current, props)?;
            if let Some(name) = &new_name {
                ensure_name_free(g, name.as_str())?;
                g.rekey_node(&current, name.as_str())?;
            }
            Ok(())
        })?;

        let updated = Session::new(
            new_name.map_or_else(|| session.login_name.clone(), |n| n.as_str().to_owned()),
            session.role,
        );
        tracing::info!(
            login = %session.login_name,
            new_login = %updated.login_name,
            password_changed = new_password.is_some(),
            "changed own credentials"
        );
        Ok(updated)
    }

    /// All accounts, administrators first, each group ordered by name.
    pub fn list(&self, session: &Session) -> ClinicResult<Vec<AccountRow>> {
        session.require_admin()?;
        self.store.read(|g| {
            Ok([AccountKind::Admin, AccountKind::User]
                .into_iter()
                .flat_map(|kind| {
                    g.nodes(kind.label()).map(move |node| AccountRow {
                        name: node.key.clone(),
                        kind,
                        person_id: person_of(node),
                    })
                })
                .collect())
        })
    }
}

/// Mapped person of the account called `name`, administrators checked first.
pub(crate) fn account_person(g: &GraphData, name: &str) -> Option<String> {
    [Label::Admin, Label::User]
        .into_iter()
        .find_map(|label| g.node(&NodeRef::new(label, name)))
        .map(person_of)
}

fn person_of(node: &Node) -> String {
    node.str_prop("person_id")
        .filter(|p| !p.is_empty())
        .unwrap_or(&node.key)
        .to_owned()
}

/// Login names are unique across both account kinds so that a login is never ambiguous.
fn ensure_name_free(g: &GraphData, name: &str) -> ClinicResult<()> {
    for label in [Label::Admin, Label::User] {
        if g.contains(&NodeRef::new(label, name)) {
            return Err(ClinicError::already_exists("account", name));
        }
    }
    Ok(())
}

/// A self-registered account maps to its own name, so that name must not already identify a person.
fn ensure_not_clinical_id(g: &GraphData, name: &str) -> ClinicResult<()> {
    for label in [Label::Doctor, Label::Patient] {
        if g.contains(&NodeRef::new(label, name)) {
            tracing::warn!(login = name, ?label, "self-registration refused for clinical id");
            return Err(ClinicError::already_exists("account", name));
        }
    }
    Ok(())
}

fn insert_account(
    g: &mut GraphData,
    kind: AccountKind,
    name: &str,
    password: &str,
    person_id: &str,
) -> ClinicResult<()> {
    ensure_name_free(g, name)?;
    g.create_node(
        kind.label(),
        name,
        object(json!({
            "password": PasswordDigest::new(password).to_string(),
            "person_id": person_id,
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::bootstrap;

    fn service() -> AccountService {
        let store = Arc::new(GraphStore::in_memory());
        bootstrap(&store, true).unwrap();
        AccountService::new(store)
    }

    fn admin() -> Session {
        Session::new("admin", Role::Administrator)
    }

    fn new_account(kind: AccountKind, name: &str, person: Option<&str>) -> NewAccount {
        NewAccount {
            kind,
            name: EntityId::new(name).unwrap(),
            password: NonEmptyText::new("secret").unwrap(),
            person_id: person.map(|p| EntityId::new(p).unwrap()),
        }
    }

    #[test]
    fn test_login_with_seeded_accounts() {
        let accounts = service();

        assert_eq!(accounts.login("admin", "admin").unwrap().role, Role::Administrator);
        assert_eq!(accounts.login("user1", "user123").unwrap().role, Role::Standard);
        assert!(matches!(
            accounts.login("user1", "wrong"),
            Err(ClinicError::InvalidCredentials)
        ));
        assert!(matches!(
            accounts.login("nobody", "x"),
            Err(ClinicError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_register_user_maps_person_to_name() {
        let accounts = service();

        accounts.register_user("P1", "pw", "pw").unwrap();

        assert_eq!(accounts.person_id("P1").unwrap().as_deref(), Some("P1"));
        assert_eq!(accounts.login("P1", "pw").unwrap().role, Role::Standard);
    }

    #[test]
    fn test_register_user_rejects_mismatch_and_duplicates() {
        let accounts = service();

        assert!(matches!(
            accounts.register_user("P1", "a", "b"),
            Err(ClinicError::InvalidInput(_))
        ));
        assert!(matches!(
            accounts.register_user("P1", "", ""),
            Err(ClinicError::InvalidInput(_))
        ));
        assert!(matches!(
            accounts.register_user("admin", "pw", "pw"),
            Err(ClinicError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_register_user_cannot_claim_clinical_ids() {
        let store = Arc::new(GraphStore::in_memory());
        bootstrap(&store, true).unwrap();
        crate::repositories::test_support::seed_people(&store);
        let accounts = AccountService::new(store);

        for taken in ["P1", "D1"] {
            assert!(matches!(
                accounts.register_user(taken, "x", "x"),
                Err(ClinicError::AlreadyExists(_))
            ));
            assert!(accounts.login(taken, "x").is_err());
        }
        assert_eq!(accounts.person_id("P1").unwrap(), None);
        accounts.register_user("P7", "x", "x").unwrap();
    }

    #[test]
    fn test_create_account_requires_admin() {
        let accounts = service();
        let user = Session::new("user1", Role::Standard);

        assert!(matches!(
            accounts.create_account(&user, new_account(AccountKind::Admin, "drada", Some("D1"))),
            Err(ClinicError::PermissionDenied(_))
        ));
        accounts
            .create_account(&admin(), new_account(AccountKind::Admin, "drada", Some("D1")))
            .unwrap();

        assert_eq!(accounts.person_id("drada").unwrap().as_deref(), Some("D1"));
        assert_eq!(accounts.login("drada", "secret").unwrap().role, Role::Administrator);
    }

    #[test]
    fn test_seeded_accounts_map_to_their_name() {
        let accounts = service();
        assert_eq!(accounts.person_id("user1").unwrap().as_deref(), Some("user1"));
        assert_eq!(accounts.person_id("ghost").unwrap(), None);
    }

    #[test]
    fn test_rename_keeps_person_mapping() {
        let accounts = service();
        accounts
            .create_account(&admin(), new_account(AccountKind::User, "pia", Some("P1")))
            .unwrap();
        let session = accounts.login("pia", "secret").unwrap();

        let renamed = accounts
            .change_own_credentials(&session, Some("pia2"), Some("newpw"))
            .unwrap();

        assert_eq!(renamed.login_name, "pia2");
        assert_eq!(accounts.person_id("pia2").unwrap().as_deref(), Some("P1"));
        assert_eq!(accounts.person_id("pia").unwrap(), None);
        assert!(accounts.login("pia2", "newpw").is_ok());
        assert!(accounts.login("pia2", "secret").is_err());
    }

    #[test]
    fn test_rename_of_seed_freezes_old_name_as_person() {
        let accounts = service();
        let session = accounts.login("user1", "user123").unwrap();

        accounts
            .change_own_credentials(&session, Some("user9"), None)
            .unwrap();

        assert_eq!(accounts.person_id("user9").unwrap().as_deref(), Some("user1"));
    }

    #[test]
    fn test_change_to_taken_name_fails_without_change() {
        let accounts = service();
        let session = accounts.login("user1", "user123").unwrap();

        assert!(matches!(
            accounts.change_own_credentials(&session, Some("admin"), Some("other")),
            Err(ClinicError::AlreadyExists(_))
        ));
        assert!(accounts.login("user1", "user123").is_ok());
    }

    #[test]
    fn test_nothing_to_change_is_noop() {
        let accounts = service();
        let session = accounts.login("user1", "user123").unwrap();

        let same = accounts
            .change_own_credentials(&session, Some("  "), None)
            .unwrap();

        assert_eq!(same, session);
    }

    #[test]
    fn test_list_hides_passwords_and_requires_admin() {
        let accounts = service();

        let rows = accounts.list(&admin()).unwrap();
        assert_eq!(
            rows.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            vec!["admin", "user1"]
        );
        assert_eq!(rows[0].kind, AccountKind::Admin);
        assert!(accounts
            .list(&Session::new("user1", Role::Standard))
            .is_err());
    }
}
