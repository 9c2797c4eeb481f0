//! Permission engine: capability checks, data scope, and export masking for the active actor.
//!
//! Every check is a total function over the actor and the reference data. Anything that
//! is not a definitive grant resolves to "denied".

mod grants;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::reference::{Company, CompanyId, ReferenceData, Role, RoleId, User};
use crate::workflows::contract::ContractRecord;

pub use grants::{
    Capability, PermissionGrant, Predicate, PredicateContext, PredicateId, PredicateRegistry,
    Scope,
};

pub const EMAIL_MASK: &str = "***@***.kz";
pub const PHONE_MASK: &str = "***";

/// Signed-in user plus an optional simulated role that takes precedence over the user's own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user: Option<User>,
    pub role_override: Option<RoleId>,
}

impl Actor {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(user: User) -> Self {
        Self {
            user: Some(user),
            role_override: None,
        }
    }

    pub fn with_role(mut self, role: RoleId) -> Self {
        self.role_override = Some(role);
        self
    }

    pub fn effective_role(&self) -> Option<&RoleId> {
        self.role_override
            .as_ref()
            .or_else(|| self.user.as_ref().map(|user| &user.role))
    }
}

/// A row owned by a partner company.
pub trait CompanyOwned {
    fn owner_company(&self) -> &CompanyId;
}

impl CompanyOwned for ContractRecord {
    fn owner_company(&self) -> &CompanyId {
        &self.company_id
    }
}

impl CompanyOwned for Company {
    fn owner_company(&self) -> &CompanyId {
        &self.id
    }
}

/// Records whose contact fields must be hidden from masking roles.
pub trait Redactable: Clone {
    fn redact_contacts(&mut self);
}

impl Redactable for User {
    fn redact_contacts(&mut self) {
        self.email = EMAIL_MASK.to_string();
        self.phone = Some(PHONE_MASK.to_string());
    }
}

#[derive(Debug, Clone)]
pub struct PermissionEngine {
    reference: Arc<ReferenceData>,
    predicates: PredicateRegistry,
}

impl PermissionEngine {
    pub fn new(reference: Arc<ReferenceData>) -> Self {
        Self::with_predicates(reference, PredicateRegistry::standard())
    }

    pub fn with_predicates(reference: Arc<ReferenceData>, predicates: PredicateRegistry) -> Self {
        Self {
            reference,
            predicates,
        }
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn role(&self, actor: &Actor) -> Option<&Role> {
        actor
            .effective_role()
            .and_then(|role| self.reference.role(role))
    }

    pub fn can(&self, actor: &Actor, capability: Capability) -> bool {
        let Some(role) = self.role(actor) else {
            return false;
        };

        match role.permissions.get(&capability) {
            Some(PermissionGrant::Allowed) => true,
            Some(PermissionGrant::ConditionalOn(predicate)) => {
                let context = PredicateContext {
                    user: actor.user.as_ref(),
                    reference: &self.reference,
                };
                self.predicates.evaluate(*predicate, &context)
            }
            Some(PermissionGrant::Denied) | None => false,
        }
    }

    /// Resolved value of every capability for the actor.
    pub fn capabilities(&self, actor: &Actor) -> BTreeMap<Capability, bool> {
        Capability::all()
            .into_iter()
            .map(|capability| (capability, self.can(actor, capability)))
            .collect()
    }

    pub fn scope(&self, actor: &Actor) -> Scope {
        self.role(actor)
            .and_then(|role| role.scope)
            .unwrap_or(Scope::Company)
    }

    pub fn filter_by_scope<T: CompanyOwned>(&self, actor: &Actor, rows: Vec<T>) -> Vec<T> {
        match self.scope(actor) {
            Scope::Global => {
                if self.can(actor, Capability::ViewAll) {
                    rows
                } else {
                    Vec::new()
                }
            }
            Scope::Region => {
                let Some(region) = actor.user.as_ref().and_then(|u| u.region_id.as_ref()) else {
                    return Vec::new();
                };
                rows.into_iter()
                    .filter(|row| {
                        self.reference
                            .company(row.owner_company())
                            .is_some_and(|company| &company.region_id == region)
                    })
                    .collect()
            }
            Scope::Company => {
                let Some(company) = actor.user.as_ref().and_then(|u| u.company_id.as_ref()) else {
                    return Vec::new();
                };
                rows.into_iter()
                    .filter(|row| row.owner_company() == company)
                    .collect()
            }
            Scope::Own => Vec::new(),
        }
    }

    pub fn filter_users_by_scope(&self, actor: &Actor, users: Vec<User>) -> Vec<User> {
        match self.scope(actor) {
            Scope::Global => users,
            Scope::Region => {
                let Some(region) = actor.user.as_ref().and_then(|u| u.region_id.as_ref()) else {
                    return Vec::new();
                };
                users
                    .into_iter()
                    .filter(|user| user.region_id.as_ref() == Some(region))
                    .collect()
            }
            Scope::Company => {
                let Some(company) = actor.user.as_ref().and_then(|u| u.company_id.as_ref()) else {
                    return Vec::new();
                };
                users
                    .into_iter()
                    .filter(|user| user.company_id.as_ref() == Some(company))
                    .collect()
            }
            Scope::Own => Vec::new(),
        }
    }

    pub fn can_void_contract(&self, actor: &Actor, contract: &ContractRecord, today: NaiveDate) -> bool {
        self.can(actor, Capability::VoidBeforeStart) && contract.coverage_not_started(today)
    }

    pub fn can_cancel_contract(
        &self,
        actor: &Actor,
        contract: &ContractRecord,
        today: NaiveDate,
    ) -> bool {
        self.can(actor, Capability::CancelBeforeStart) && contract.coverage_not_started(today)
    }

    /// Returns a copy with contact fields replaced by fixed markers for masking roles.
    pub fn mask_sensitive_data<T: Redactable>(&self, actor: &Actor, record: &T) -> T {
        let mut copy = record.clone();
        if self.can(actor, Capability::MaskSensitive) {
            copy.redact_contacts();
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{seed, UserId};

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: &'static str,
        company: CompanyId,
    }

    impl CompanyOwned for Row {
        fn owner_company(&self) -> &CompanyId {
            &self.company
        }
    }

    fn engine() -> PermissionEngine {
        PermissionEngine::new(Arc::new(ReferenceData::standard()))
    }

    fn actor(engine: &PermissionEngine, email: &str) -> Actor {
        let user = engine
            .reference()
            .user_by_email(email)
            .cloned()
            .expect("seeded user");
        Actor::for_user(user)
    }

    fn rows() -> Vec<Row> {
        ["tc-1", "tc-2", "tc-3", "tc-4", "tc-5", "tc-6", "tc-1"]
            .iter()
            .enumerate()
            .map(|(index, company)| Row {
                id: ["a", "b", "c", "d", "e", "f", "g"][index],
                company: CompanyId::new(*company),
            })
            .collect()
    }

    #[test]
    fn company_scope_keeps_only_own_company_rows() {
        let engine = engine();
        let operator = actor(&engine, "operator1@silkroad.kz");
        let visible = engine.filter_by_scope(&operator, rows());
        let ids: Vec<_> = visible.iter().map(|row| row.id).collect();
        assert_eq!(ids, vec!["a", "g"]);
    }

    #[test]
    fn role_without_scope_falls_back_to_company() {
        let mut reference = ReferenceData::standard();
        reference
            .roles
            .get_mut(&RoleId::new(seed::ROLE_OPERATOR))
            .expect("operator role")
            .scope = None;
        let engine = PermissionEngine::new(Arc::new(reference));
        let operator = actor(&engine, "operator1@silkroad.kz");

        assert_eq!(engine.scope(&operator), Scope::Company);
        let ids: Vec<_> = engine
            .filter_by_scope(&operator, rows())
            .iter()
            .map(|row| row.id)
            .collect();
        assert_eq!(ids, vec!["a", "g"]);
    }

    #[test]
    fn region_scope_keeps_rows_of_companies_in_region() {
        let engine = engine();
        let curator = actor(&engine, "curator.astana@insurance.kz");
        let visible = engine.filter_by_scope(&curator, rows());
        let ids: Vec<_> = visible.iter().map(|row| row.id).collect();
        assert_eq!(ids, vec!["c", "d"]);
    }

    #[test]
    fn global_scope_requires_view_all() {
        let engine = engine();
        let owner = actor(&engine, "owner@insurance.kz");
        assert_eq!(engine.filter_by_scope(&owner, rows()), rows());

        let mut reference = ReferenceData::standard();
        let owner_role = RoleId::new(seed::ROLE_OWNER);
        reference
            .roles
            .get_mut(&owner_role)
            .expect("owner role")
            .permissions
            .insert(Capability::ViewAll, PermissionGrant::Denied);
        let restricted = PermissionEngine::new(Arc::new(reference));
        assert!(restricted.filter_by_scope(&owner, rows()).is_empty());
    }

    #[test]
    fn missing_user_context_sees_nothing() {
        let engine = engine();
        let ghost = Actor::anonymous().with_role(RoleId::new(seed::ROLE_OPERATOR));
        assert!(engine.filter_by_scope(&ghost, rows()).is_empty());
        assert!(engine
            .filter_users_by_scope(&ghost, engine.reference().users.clone())
            .is_empty());
    }

    #[test]
    fn unknown_role_and_capability_fail_closed() {
        let engine = engine();
        let stranger = Actor::anonymous().with_role(RoleId::new("ghost"));
        assert!(Capability::all()
            .into_iter()
            .all(|capability| !engine.can(&stranger, capability)));
        assert_eq!(engine.scope(&stranger), Scope::Company);

        let operator = actor(&engine, "operator1@silkroad.kz");
        assert!(!engine.can(&operator, Capability::MaskSensitive));
    }

    #[test]
    fn conditional_user_admin_follows_company_flag() {
        let engine = engine();
        let silk_road_admin = actor(&engine, "admin@silkroad.kz");
        let nomad_admin = actor(&engine, "admin@nomad.kz");
        assert!(engine.can(&silk_road_admin, Capability::AdminUsers));
        assert!(!engine.can(&nomad_admin, Capability::AdminUsers));

        let bare = PermissionEngine::with_predicates(
            Arc::new(ReferenceData::standard()),
            PredicateRegistry::empty(),
        );
        assert!(!bare.can(&silk_road_admin, Capability::AdminUsers));
    }

    #[test]
    fn role_override_takes_precedence() {
        let engine = engine();
        let operator = actor(&engine, "operator1@silkroad.kz");
        assert!(!engine.can(&operator, Capability::Reports));
        let simulated = operator.with_role(RoleId::new(seed::ROLE_PARTNER_ADMIN));
        assert!(engine.can(&simulated, Capability::Reports));
    }

    #[test]
    fn user_listing_follows_scope() {
        let engine = engine();
        let users = engine.reference().users.clone();

        let admin = actor(&engine, "admin@silkroad.kz");
        let company_users = engine.filter_users_by_scope(&admin, users.clone());
        assert_eq!(company_users.len(), 3);

        let regional = actor(&engine, "admin.almaty@insurance.kz");
        let region_users = engine.filter_users_by_scope(&regional, users.clone());
        assert!(region_users
            .iter()
            .all(|user| user.region_id.as_ref().map(|r| r.0.as_str()) == Some("reg-1")));

        let owner = actor(&engine, "owner@insurance.kz");
        assert_eq!(engine.filter_users_by_scope(&owner, users.clone()).len(), users.len());
    }

    #[test]
    fn masking_applies_only_to_masking_roles() {
        let engine = engine();
        let target = User {
            id: UserId::new("u-x"),
            email: "someone@silkroad.kz".to_string(),
            name: "Someone".to_string(),
            phone: Some("+7 701 000 0000".to_string()),
            role: RoleId::new(seed::ROLE_OPERATOR),
            company_id: None,
            region_id: None,
        };

        let observer = actor(&engine, "assistance@insurance.kz");
        let masked = engine.mask_sensitive_data(&observer, &target);
        assert_eq!(masked.email, EMAIL_MASK);
        assert_eq!(masked.phone.as_deref(), Some(PHONE_MASK));
        assert_eq!(target.email, "someone@silkroad.kz");

        let owner = actor(&engine, "owner@insurance.kz");
        assert_eq!(engine.mask_sensitive_data(&owner, &target), target);
    }

    #[test]
    fn masking_sets_markers_even_without_contacts() {
        let engine = engine();
        let target = User {
            id: UserId::new("u-y"),
            email: String::new(),
            name: "No Contacts".to_string(),
            phone: None,
            role: RoleId::new(seed::ROLE_OPERATOR),
            company_id: None,
            region_id: None,
        };

        let observer = actor(&engine, "assistance@insurance.kz");
        let masked = engine.mask_sensitive_data(&observer, &target);
        assert_eq!(masked.email, EMAIL_MASK);
        assert_eq!(masked.phone.as_deref(), Some(PHONE_MASK));
    }
}
