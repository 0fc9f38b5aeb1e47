//! Row-level visibility by role and store/zone scope

use coldline_core::models::{ProfileScope, Record, Role, UserProfile};

/// Visibility rule for one actor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeFilter {
    role: Role,
    scope: ProfileScope,
}

impl ScopeFilter {
    pub fn new(role: Role, scope: ProfileScope) -> Self {
        Self { role, scope }
    }

    pub fn for_profile(profile: &UserProfile) -> Self {
        Self::new(profile.role, profile.scope.clone())
    }

    pub fn allows(&self, record: &Record) -> bool {
        let tags = record.scope();
        match self.role {
            Role::Admin | Role::User => true,
            // A manager without a store sees nothing rather than everything
            Role::Manager => matches_tag(self.scope.store.as_deref(), tags.store.as_deref()),
            Role::ZoneManager => {
                matches_tag(self.scope.zone.as_deref(), tags.zone.as_deref())
                    && (self.scope.store.is_none()
                        || matches_tag(self.scope.store.as_deref(), tags.store.as_deref()))
            }
        }
    }

    /// The records this actor may see, in input order
    pub fn visible_set(&self, records: &[Record]) -> Vec<Record> {
        records
            .iter()
            .filter(|record| self.allows(record))
            .cloned()
            .collect()
    }
}

/// Shorthand for `ScopeFilter::new(role, scope).visible_set(records)`
pub fn visible_set(role: Role, scope: &ProfileScope, records: &[Record]) -> Vec<Record> {
    ScopeFilter::new(role, scope.clone()).visible_set(records)
}

fn matches_tag(wanted: Option<&str>, actual: Option<&str>) -> bool {
    match (wanted, actual) {
        (Some(wanted), Some(actual)) => normalise(wanted) == normalise(actual),
        _ => false,
    }
}

fn normalise(tag: &str) -> String {
    tag.trim().to_lowercase()
}
