use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown role: '{0}'")]
pub struct UnknownRole(pub String);

/// Roles as stored in the identity table. Anything else is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    InternalAdmin,
    InternalStaff,
    ClientOwner,
    ClientUser,
}

impl UserRole {
    pub const ALL: [UserRole; 4] = [
        UserRole::InternalAdmin,
        UserRole::InternalStaff,
        UserRole::ClientOwner,
        UserRole::ClientUser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::InternalAdmin => "internal_admin",
            UserRole::InternalStaff => "internal_staff",
            UserRole::ClientOwner => "client_owner",
            UserRole::ClientUser => "client_user",
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, UserRole::InternalAdmin | UserRole::InternalStaff)
    }

    pub fn is_client(&self) -> bool {
        matches!(self, UserRole::ClientOwner | UserRole::ClientUser)
    }

    /// Lenient parse for role strings coming out of user metadata.
    pub fn parse_lenient(raw: Option<&str>) -> Option<UserRole> {
        raw.and_then(|r| r.trim().parse().ok())
    }
}

impl FromStr for UserRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "internal_admin" => Ok(UserRole::InternalAdmin),
            "internal_staff" => Ok(UserRole::InternalStaff),
            "client_owner" => Ok(UserRole::ClientOwner),
            "client_user" => Ok(UserRole::ClientUser),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse permission tier used by the calendar and the admin surfaces.
/// Only ever derived from a role; parse through `FromStr`, never serde.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Admin,
    Usuario,
    Desconhecido,
}

impl AccessLevel {
    pub fn from_role(role: Option<UserRole>) -> AccessLevel {
        match role {
            Some(r) if r.is_internal() => AccessLevel::Admin,
            Some(r) if r.is_client() => AccessLevel::Usuario,
            _ => AccessLevel::Desconhecido,
        }
    }

    /// Total mapping from a raw role string. Unknown input never maps to admin.
    pub fn from_role_str(raw: Option<&str>) -> AccessLevel {
        AccessLevel::from_role(UserRole::parse_lenient(raw))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Admin => "admin",
            AccessLevel::Usuario => "usuario",
            AccessLevel::Desconhecido => "desconhecido",
        }
    }

    pub fn can_create_posts(&self) -> bool {
        matches!(self, AccessLevel::Admin)
    }

    pub fn can_edit_post_details(&self) -> bool {
        !matches!(self, AccessLevel::Desconhecido)
    }

    pub fn can_archive_posts(&self) -> bool {
        !matches!(self, AccessLevel::Desconhecido)
    }

    pub fn can_delete_posts(&self) -> bool {
        matches!(self, AccessLevel::Admin)
    }

    pub fn can_manage_notifications(&self) -> bool {
        matches!(self, AccessLevel::Admin)
    }

    pub fn can_manage_clients(&self) -> bool {
        matches!(self, AccessLevel::Admin)
    }
}

impl FromStr for AccessLevel {
    type Err = std::convert::Infallible;

    /// Unrecognized values are treated as `desconhecido`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "admin" => AccessLevel::Admin,
            "usuario" => AccessLevel::Usuario,
            _ => AccessLevel::Desconhecido,
        })
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKey {
    Dashboard,
    Onboarding,
    Financeiro,
    Calendario,
    Crm,
    Reunioes,
    Avisos,
}

impl ModuleKey {
    pub const ALL: [ModuleKey; 7] = [
        ModuleKey::Dashboard,
        ModuleKey::Onboarding,
        ModuleKey::Financeiro,
        ModuleKey::Calendario,
        ModuleKey::Crm,
        ModuleKey::Reunioes,
        ModuleKey::Avisos,
    ];

    fn allowed_roles(&self) -> &'static [UserRole] {
        const EVERYONE: &[UserRole] = &UserRole::ALL;
        const INTERNAL: &[UserRole] = &[UserRole::InternalAdmin, UserRole::InternalStaff];
        match self {
            ModuleKey::Crm => INTERNAL,
            _ => EVERYONE,
        }
    }
}

pub fn can_access_module(module: ModuleKey, role: Option<UserRole>) -> bool {
    match role {
        Some(r) => module.allowed_roles().contains(&r),
        None => false,
    }
}

pub fn accessible_modules(role: Option<UserRole>) -> Vec<ModuleKey> {
    ModuleKey::ALL
        .iter()
        .copied()
        .filter(|m| can_access_module(*m, role))
        .collect()
}
