use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::AppError;

/// Coarse built-in account categories issued by the dealership SSO.
///
/// The account type is only ever a fallback key for default permissions,
/// never the primary authorization mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Dealership general manager; highest-privilege built-in kind.
    GeneralManager,
    /// Workshop service manager.
    ServiceManager,
    /// Front-desk service advisor.
    ServiceAdvisor,
}

impl AccountType {
    /// Returns a stable storage value for this account type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GeneralManager => "general_manager",
            Self::ServiceManager => "service_manager",
            Self::ServiceAdvisor => "service_advisor",
        }
    }

    /// Returns whether this is the highest-privilege built-in kind.
    #[must_use]
    pub fn is_general_manager(&self) -> bool {
        matches!(self, Self::GeneralManager)
    }
}

impl FromStr for AccountType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "general_manager" => Ok(Self::GeneralManager),
            "service_manager" => Ok(Self::ServiceManager),
            "service_advisor" => Ok(Self::ServiceAdvisor),
            _ => Err(AppError::Validation(format!(
                "unknown account type '{value}'"
            ))),
        }
    }
}

/// User information forwarded by the upstream authentication proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    email: String,
    display_name: String,
    account_type: AccountType,
    city: Option<String>,
}

impl UserIdentity {
    /// Creates a user identity from forwarded authentication data.
    #[must_use]
    pub fn new(
        email: impl Into<String>,
        display_name: impl Into<String>,
        account_type: AccountType,
        city: Option<String>,
    ) -> Self {
        Self {
            email: email.into(),
            display_name: display_name.into(),
            account_type,
            city,
        }
    }

    /// Returns the email used as the stable join key across subsystems.
    #[must_use]
    pub fn email(&self) -> &str {
        self.email.as_str()
    }

    /// Returns the display name for the current user.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the coarse built-in account type.
    #[must_use]
    pub fn account_type(&self) -> AccountType {
        self.account_type
    }

    /// Returns the dealership city, when the proxy forwarded one.
    #[must_use]
    pub fn city(&self) -> Option<&str> {
        self.city.as_deref()
    }
}
