use crate::constants::auth as auth_constants;
use crate::services::operation_index::OperationDescriptor;
use crate::services::settings::Settings;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthLocation {
    Header,
    Query,
}

impl AuthLocation {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "header" => Some(AuthLocation::Header),
            "query" => Some(AuthLocation::Query),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AuthLocation::Header => "header",
            AuthLocation::Query => "query",
        }
    }
}

/// Credential placement declared by an interface document for an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityScheme {
    None,
    Header { name: String },
    Query { name: String },
}

#[derive(Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Absent,
    Attach {
        location: AuthLocation,
        name: String,
        secret: String,
    },
}

impl AuthDecision {
    pub fn is_present(&self) -> bool {
        matches!(self, AuthDecision::Attach { .. })
    }

    pub fn location(&self) -> Option<AuthLocation> {
        match self {
            AuthDecision::Absent => None,
            AuthDecision::Attach { location, .. } => Some(*location),
        }
    }
}

impl fmt::Debug for AuthDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthDecision::Absent => write!(f, "Absent"),
            AuthDecision::Attach { location, name, .. } => f
                .debug_struct("Attach")
                .field("location", location)
                .field("name", name)
                .field("secret", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Operator-supplied placement that beats whatever the document declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOverride {
    pub location: AuthLocation,
    pub name: String,
}

#[derive(Clone)]
pub struct AuthResolver {
    secret: Option<String>,
    force: Option<AuthOverride>,
}

impl fmt::Debug for AuthResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResolver")
            .field("secret_present", &self.secret.is_some())
            .field("force", &self.force)
            .finish()
    }
}

impl AuthResolver {
    pub fn new(secret: Option<String>, force: Option<AuthOverride>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            force,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let force = settings.auth_location.map(|location| AuthOverride {
            location,
            name: match location {
                AuthLocation::Header => settings.override_header_name().to_string(),
                AuthLocation::Query => settings.override_query_name().to_string(),
            },
        });
        Self::new(settings.api_key.clone(), force)
    }

    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    pub fn decide(&self, descriptor: &OperationDescriptor) -> AuthDecision {
        let Some(secret) = self.secret.clone() else {
            return AuthDecision::Absent;
        };
        let (location, name) = if let Some(force) = &self.force {
            (force.location, force.name.clone())
        } else {
            match &descriptor.security {
                SecurityScheme::Header { name } => (AuthLocation::Header, name.clone()),
                SecurityScheme::Query { name } => (AuthLocation::Query, name.clone()),
                SecurityScheme::None => (
                    AuthLocation::Header,
                    auth_constants::DEFAULT_PARAM_NAME.to_string(),
                ),
            }
        };
        AuthDecision::Attach {
            location,
            name,
            secret,
        }
    }

    /// Name the credential would carry if it were placed in the query string
    /// for this operation, independent of where this call actually puts it.
    pub fn query_param_name(&self, descriptor: &OperationDescriptor) -> String {
        if let Some(force) = self
            .force
            .as_ref()
            .filter(|force| force.location == AuthLocation::Query)
        {
            return force.name.clone();
        }
        match &descriptor.security {
            SecurityScheme::Query { name } => name.clone(),
            _ => auth_constants::DEFAULT_PARAM_NAME.to_string(),
        }
    }
}
