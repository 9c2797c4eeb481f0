use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::reference::{ReferenceData, User};

/// Named action or visibility right attached to a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Create,
    Activate,
    ViewOwn,
    ViewCompany,
    ViewRegion,
    ViewAll,
    Reports,
    ReportsExport,
    AdminUsers,
    AdminSettings,
    AdminBlanks,
    VoidBeforeStart,
    CancelBeforeStart,
    SearchOnly,
    MaskSensitive,
}

impl Capability {
    pub const fn all() -> [Self; 15] {
        [
            Self::Create,
            Self::Activate,
            Self::ViewOwn,
            Self::ViewCompany,
            Self::ViewRegion,
            Self::ViewAll,
            Self::Reports,
            Self::ReportsExport,
            Self::AdminUsers,
            Self::AdminSettings,
            Self::AdminBlanks,
            Self::VoidBeforeStart,
            Self::CancelBeforeStart,
            Self::SearchOnly,
            Self::MaskSensitive,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Activate => "activate",
            Self::ViewOwn => "view_own",
            Self::ViewCompany => "view_company",
            Self::ViewRegion => "view_region",
            Self::ViewAll => "view_all",
            Self::Reports => "reports",
            Self::ReportsExport => "reports_export",
            Self::AdminUsers => "admin_users",
            Self::AdminSettings => "admin_settings",
            Self::AdminBlanks => "admin_blanks",
            Self::VoidBeforeStart => "void_before_start",
            Self::CancelBeforeStart => "cancel_before_start",
            Self::SearchOnly => "search_only",
            Self::MaskSensitive => "mask_sensitive",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identifies a predicate that decides a conditional grant at check time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateId {
    CompanyAllowsLocalUserAdmin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionGrant {
    Allowed,
    Denied,
    ConditionalOn(PredicateId),
}

/// Data-visibility tier of a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Own,
    Company,
    Region,
    Global,
}

impl Scope {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Own => "own",
            Self::Company => "company",
            Self::Region => "region",
            Self::Global => "global",
        }
    }
}

/// Inputs available to a conditional-grant predicate.
#[derive(Debug, Clone, Copy)]
pub struct PredicateContext<'a> {
    pub user: Option<&'a User>,
    pub reference: &'a ReferenceData,
}

pub type Predicate = fn(&PredicateContext<'_>) -> bool;

/// Resolves [`PredicateId`]s to their evaluation functions. Missing entries deny.
#[derive(Clone, Default)]
pub struct PredicateRegistry {
    predicates: HashMap<PredicateId, Predicate>,
}

impl PredicateRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(
            PredicateId::CompanyAllowsLocalUserAdmin,
            company_allows_local_user_admin,
        );
        registry
    }

    pub fn register(&mut self, id: PredicateId, predicate: Predicate) {
        self.predicates.insert(id, predicate);
    }

    pub fn evaluate(&self, id: PredicateId, context: &PredicateContext<'_>) -> bool {
        self.predicates
            .get(&id)
            .map(|predicate| predicate(context))
            .unwrap_or(false)
    }
}

impl fmt::Debug for PredicateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateRegistry")
            .field("predicates", &self.predicates.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn company_allows_local_user_admin(context: &PredicateContext<'_>) -> bool {
    context
        .user
        .and_then(|user| user.company_id.as_ref())
        .and_then(|company_id| context.reference.company(company_id))
        .map(|company| company.allow_local_user_admin)
        .unwrap_or(false)
}
