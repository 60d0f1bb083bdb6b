//! Actors and the resolution of their effective workflow role
use super::config::GatePolicy;
use super::request::RequestKind;
use std::fmt;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(#[n(0)] pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role as reported by the system of record. `Manager` means the actor is a
/// manager whose precise sub-role was not provided.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    #[n(0)]
    Requester,
    #[n(1)]
    DirectManager,
    #[n(2)]
    Accountant,
    #[n(3)]
    FinalManager,
    #[n(4)]
    Admin,
    #[n(5)]
    Sales,
    #[n(6)]
    Manager,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Requester,
        Role::DirectManager,
        Role::Accountant,
        Role::FinalManager,
        Role::Admin,
        Role::Sales,
        Role::Manager,
    ];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Requester => "Requester",
            Role::DirectManager => "Direct Manager",
            Role::Accountant => "Accountant",
            Role::FinalManager => "Final Manager",
            Role::Admin => "Admin",
            Role::Sales => "Sales",
            Role::Manager => "Manager",
        };
        f.write_str(name)
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    #[n(0)]
    pub id: ActorId,
    #[n(1)]
    pub role: Role,
}

impl Actor {
    pub fn new(id: u64, role: Role) -> Self {
        Self {
            id: ActorId(id),
            role,
        }
    }
}

/// The role the gate evaluates an actor as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveRole {
    Declared(Role),
    /// A broad manager standing in for the sub-role the request kind implies
    Assumed { role: Role, kind: RequestKind },
}

impl EffectiveRole {
    pub fn role(&self) -> Role {
        match self {
            EffectiveRole::Declared(role) | EffectiveRole::Assumed { role, .. } => *role,
        }
    }
    pub fn is_assumed(&self) -> bool {
        matches!(self, EffectiveRole::Assumed { .. })
    }
}

/// Purchases are first approved by a direct manager and projects by the final
/// manager, so an unspecified manager takes whichever of the two the kind
/// routes to. With the fallback disabled the manager keeps its declared role.
pub fn resolve_effective_role(role: Role, kind: RequestKind, policy: &GatePolicy) -> EffectiveRole {
    match (role, policy.assume_unknown_manager) {
        (Role::Manager, true) => {
            let role = match kind {
                RequestKind::Purchase => Role::DirectManager,
                RequestKind::Project => Role::FinalManager,
            };
            EffectiveRole::Assumed { role, kind }
        }
        (role, _) => EffectiveRole::Declared(role),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_manager_follows_kind() {
        let policy = GatePolicy::default();

        assert_eq!(
            resolve_effective_role(Role::Manager, RequestKind::Purchase, &policy).role(),
            Role::DirectManager
        );
        assert_eq!(
            resolve_effective_role(Role::Manager, RequestKind::Project, &policy),
            EffectiveRole::Assumed {
                role: Role::FinalManager,
                kind: RequestKind::Project
            }
        );
    }

    #[test]
    fn fallback_can_be_disabled() {
        let policy = GatePolicy {
            assume_unknown_manager: false,
        };
        let resolved = resolve_effective_role(Role::Manager, RequestKind::Purchase, &policy);

        assert_eq!(resolved, EffectiveRole::Declared(Role::Manager));
        assert!(!resolved.is_assumed());
    }

    #[test]
    fn declared_roles_pass_through() {
        let policy = GatePolicy::default();
        for role in Role::ALL.into_iter().filter(|role| *role != Role::Manager) {
            for kind in [RequestKind::Purchase, RequestKind::Project] {
                assert_eq!(
                    resolve_effective_role(role, kind, &policy),
                    EffectiveRole::Declared(role)
                );
            }
        }
    }
}
