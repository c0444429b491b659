//! Companies and roles a session can be opened for.
//!
//! Lookups are case-insensitive. Unknown companies yield `None`; unknown
//! roles fall back to their raw id as the display name.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyProfile {
    pub name: &'static str,
    pub display_name: &'static str,
    pub tagline: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleProfile {
    pub id: String,
    pub display_name: String,
}

static COMPANIES: &[CompanyProfile] = &[
    CompanyProfile {
        name: "google",
        display_name: "Google",
        tagline: "Let's help you ace your Google interview",
    },
    CompanyProfile {
        name: "meta",
        display_name: "Meta",
        tagline: "Let's help you ace your Meta interview",
    },
    CompanyProfile {
        name: "amazon",
        display_name: "Amazon",
        tagline: "Let's help you ace your Amazon interview",
    },
    CompanyProfile {
        name: "apple",
        display_name: "Apple",
        tagline: "Let's help you ace your Apple interview",
    },
    CompanyProfile {
        name: "microsoft",
        display_name: "Microsoft",
        tagline: "Let's help you ace your Microsoft interview",
    },
    CompanyProfile {
        name: "netflix",
        display_name: "Netflix",
        tagline: "Let's help you ace your Netflix interview",
    },
];

static ROLES: &[(&str, &str)] = &[
    ("software-engineer", "Software Engineer"),
    ("product-manager", "Product Manager"),
    ("data-scientist", "Data Scientist"),
    ("designer", "Designer"),
    ("engineering-manager", "Engineering Manager"),
];

pub fn company_profile(company: &str) -> Option<&'static CompanyProfile> {
    COMPANIES
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(company))
}

pub fn role_profile(role: &str) -> RoleProfile {
    let display_name = ROLES
        .iter()
        .find(|(id, _)| id.eq_ignore_ascii_case(role))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| role.to_string());
    RoleProfile {
        id: role.to_ascii_lowercase(),
        display_name,
    }
}

/// Display name for a company id, falling back to the id itself.
pub fn company_display_name(company: &str) -> String {
    company_profile(company)
        .map(|c| c.display_name.to_string())
        .unwrap_or_else(|| company.to_string())
}
