//! Translation of a permission profile into engine access grants
//!
//! The mapping is pure: the same profile always yields the same grants.
//! Enforcement belongs to the engine adapter receiving them.

use serde::Serialize;

use crate::core::PermissionProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IoAccess {
    None,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HostAccess {
    None,
    All,
}

/// Predicate deciding which host classes a script may look up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HostClassLookup {
    DenyAll,
    AllowAll,
}

impl HostClassLookup {
    pub fn permits(&self, _class_name: &str) -> bool {
        matches!(self, HostClassLookup::AllowAll)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentAccess {
    None,
    Inherit,
}

/// Concrete grants handed to the engine when a context is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilityGrants {
    pub io: IoAccess,
    pub host_access: HostAccess,
    pub host_class_lookup: HostClassLookup,
    pub create_thread: bool,
    pub environment: EnvironmentAccess,
    /// Recorded only, never enforced
    pub max_execution_time_ms: u64,
    /// Recorded only, never enforced
    pub max_memory_bytes: u64,
}

impl CapabilityGrants {
    /// Map a profile onto grants.
    ///
    /// Network operations go through host objects, so `allow_network` also
    /// opens host access.
    pub fn from_profile(profile: &PermissionProfile) -> Self {
        let io = if profile.allow_io {
            IoAccess::All
        } else {
            IoAccess::None
        };

        let host_access = if profile.allow_host_access || profile.allow_network {
            HostAccess::All
        } else {
            HostAccess::None
        };

        let host_class_lookup = if profile.allow_network {
            HostClassLookup::AllowAll
        } else {
            HostClassLookup::DenyAll
        };

        let environment = if profile.allow_environment_access {
            EnvironmentAccess::Inherit
        } else {
            EnvironmentAccess::None
        };

        Self {
            io,
            host_access,
            host_class_lookup,
            create_thread: profile.allow_create_thread,
            environment,
            max_execution_time_ms: profile.max_execution_time,
            max_memory_bytes: profile.max_memory_usage,
        }
    }
}

impl From<&PermissionProfile> for CapabilityGrants {
    fn from(profile: &PermissionProfile) -> Self {
        Self::from_profile(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_grants() {
        let grants = CapabilityGrants::from_profile(&PermissionProfile::sandbox());
        assert_eq!(grants.io, IoAccess::None);
        assert_eq!(grants.host_access, HostAccess::None);
        assert_eq!(grants.host_class_lookup, HostClassLookup::DenyAll);
        assert!(!grants.create_thread);
        assert_eq!(grants.environment, EnvironmentAccess::None);
        assert_eq!(grants.max_execution_time_ms, 30_000);
    }

    #[test]
    fn test_permissive_grants() {
        let grants = CapabilityGrants::from_profile(&PermissionProfile::permissive());
        assert_eq!(grants.io, IoAccess::All);
        assert_eq!(grants.host_access, HostAccess::All);
        assert_eq!(grants.host_class_lookup, HostClassLookup::AllowAll);
        assert!(grants.create_thread);
        assert_eq!(grants.environment, EnvironmentAccess::Inherit);
    }

    #[test]
    fn test_network_implies_host_access() {
        let profile = PermissionProfile {
            allow_network: true,
            ..PermissionProfile::sandbox()
        };
        let grants = CapabilityGrants::from_profile(&profile);
        assert_eq!(grants.host_access, HostAccess::All);
        assert!(grants.host_class_lookup.permits("java.net.URL"));
    }

    #[test]
    fn test_host_access_alone_keeps_lookup_denied() {
        let profile = PermissionProfile {
            allow_host_access: true,
            ..PermissionProfile::sandbox()
        };
        let grants = CapabilityGrants::from_profile(&profile);
        assert_eq!(grants.host_access, HostAccess::All);
        assert!(!grants.host_class_lookup.permits("anything"));
    }

    #[test]
    fn test_io_and_file_access_are_independent() {
        let profile = PermissionProfile {
            allow_file_access: true,
            ..PermissionProfile::sandbox()
        };
        assert_eq!(CapabilityGrants::from_profile(&profile).io, IoAccess::None);

        let profile = PermissionProfile {
            allow_io: true,
            ..PermissionProfile::sandbox()
        };
        assert_eq!(CapabilityGrants::from_profile(&profile).io, IoAccess::All);
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let profile = PermissionProfile {
            allow_create_thread: true,
            allow_environment_access: true,
            ..PermissionProfile::sandbox()
        };
        assert_eq!(
            CapabilityGrants::from_profile(&profile),
            CapabilityGrants::from(&profile)
        );
    }
}
