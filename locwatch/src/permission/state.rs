//! Authorization state and permission levels.

use serde::{Deserialize, Serialize};

/// Level of location access an application can request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    /// Access while the application is in use.
    #[default]
    #[serde(rename = "when_in_use", alias = "while_in_use")]
    WhileInUse,
    /// Access at any time, including in the background.
    Always,
}

impl std::fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WhileInUse => write!(f, "when_in_use"),
            Self::Always => write!(f, "always"),
        }
    }
}

impl std::str::FromStr for PermissionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "when_in_use" | "while_in_use" | "wheninuse" => Ok(Self::WhileInUse),
            "always" => Ok(Self::Always),
            other => Err(format!(
                "unknown permission level '{}', expected when_in_use or always",
                other
            )),
        }
    }
}

/// Location authorization as reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationState {
    /// The user has not been asked yet.
    #[default]
    NotDetermined,
    /// The user refused access.
    Denied,
    /// Access is blocked by policy and cannot be changed by the user.
    RestrictedByPolicy,
    /// Access granted while the application is in use.
    GrantedWhileInUse,
    /// Access granted at all times.
    GrantedAlways,
}

impl AuthorizationState {
    /// Returns true if acquisition may be started in this state.
    #[inline]
    pub fn allows_acquisition(&self) -> bool {
        matches!(self, Self::GrantedWhileInUse | Self::GrantedAlways)
    }

    /// Returns true if this state grants at least `level`.
    pub fn satisfies(&self, level: PermissionLevel) -> bool {
        match self {
            Self::GrantedAlways => true,
            Self::GrantedWhileInUse => level == PermissionLevel::WhileInUse,
            _ => false,
        }
    }

    /// Returns true if the user or policy refused access.
    #[inline]
    pub fn is_refused(&self) -> bool {
        matches!(self, Self::Denied | Self::RestrictedByPolicy)
    }
}

impl std::fmt::Display for AuthorizationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NotDetermined => "not_determined",
            Self::Denied => "denied",
            Self::RestrictedByPolicy => "restricted_by_policy",
            Self::GrantedWhileInUse => "granted_while_in_use",
            Self::GrantedAlways => "granted_always",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for AuthorizationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "not_determined" => Ok(Self::NotDetermined),
            "denied" => Ok(Self::Denied),
            "restricted" | "restricted_by_policy" => Ok(Self::RestrictedByPolicy),
            "granted_while_in_use" | "when_in_use" => Ok(Self::GrantedWhileInUse),
            "granted_always" | "always" => Ok(Self::GrantedAlways),
            other => Err(format!("unknown authorization state '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_granted_states_allow_acquisition() {
        assert!(!AuthorizationState::NotDetermined.allows_acquisition());
        assert!(!AuthorizationState::Denied.allows_acquisition());
        assert!(!AuthorizationState::RestrictedByPolicy.allows_acquisition());
        assert!(AuthorizationState::GrantedWhileInUse.allows_acquisition());
        assert!(AuthorizationState::GrantedAlways.allows_acquisition());
    }

    #[test]
    fn test_refused_states() {
        assert!(AuthorizationState::Denied.is_refused());
        assert!(AuthorizationState::RestrictedByPolicy.is_refused());
        assert!(!AuthorizationState::NotDetermined.is_refused());
        assert!(!AuthorizationState::GrantedAlways.is_refused());
    }

    #[test]
    fn test_satisfies() {
        use PermissionLevel::*;
        assert!(AuthorizationState::GrantedAlways.satisfies(Always));
        assert!(AuthorizationState::GrantedAlways.satisfies(WhileInUse));
        assert!(AuthorizationState::GrantedWhileInUse.satisfies(WhileInUse));
        assert!(!AuthorizationState::GrantedWhileInUse.satisfies(Always));
        assert!(!AuthorizationState::Denied.satisfies(WhileInUse));
    }

    #[test]
    fn test_parse_round_trip() {
        for state in [
            AuthorizationState::NotDetermined,
            AuthorizationState::Denied,
            AuthorizationState::RestrictedByPolicy,
            AuthorizationState::GrantedWhileInUse,
            AuthorizationState::GrantedAlways,
        ] {
            assert_eq!(state.to_string().parse::<AuthorizationState>(), Ok(state));
        }
        assert_eq!("always".parse::<PermissionLevel>(), Ok(PermissionLevel::Always));
        assert!("sometimes".parse::<PermissionLevel>().is_err());
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&AuthorizationState::GrantedWhileInUse).unwrap();
        assert_eq!(json, "\"granted_while_in_use\"");
        let level: PermissionLevel = serde_json::from_str("\"always\"").unwrap();
        assert_eq!(level, PermissionLevel::Always);
    }
}
