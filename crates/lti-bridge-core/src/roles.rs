//! LTI role claims and their precedence.

use crate::model::LaunchContext;

/// Highest LTI context role of a launch, ordered `Other < … < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RoleRank {
    Other = 0,
    Learner = 1,
    Ta = 2,
    Designer = 3,
    Teacher = 4,
    Admin = 5,
}

impl RoleRank {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Teacher => "teacher",
            Self::Designer => "designer",
            Self::Ta => "ta",
            Self::Learner => "learner",
            Self::Other => "other",
        }
    }

    /// Admins and teachers bypass the teachers-only restriction.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Self::Admin | Self::Teacher)
    }
}

/// Precedence list: first rank whose namespaced or bare token is present wins.
const PRECEDENCE: &[(RoleRank, &str, &str)] = &[
    (
        RoleRank::Admin,
        "urn:lti:instrole:ims/lis/Administrator",
        "Administrator",
    ),
    (
        RoleRank::Teacher,
        "urn:lti:role:ims/lis/Instructor",
        "Instructor",
    ),
    (
        RoleRank::Designer,
        "urn:lti:role:ims/lis/ContentDeveloper",
        "ContentDeveloper",
    ),
    (
        RoleRank::Ta,
        "urn:lti:role:ims/lis/TeachingAssistant",
        "TeachingAssistant",
    ),
    (RoleRank::Learner, "urn:lti:role:ims/lis/Learner", "Learner"),
];

/// Role tokens of a launch: `ext_roles` if present, else `roles`, else none.
pub fn parse_roles(ctx: &LaunchContext) -> Vec<String> {
    let raw = match (&ctx.ext_roles, &ctx.roles) {
        (Some(ext), _) => ext,
        (None, Some(roles)) => roles,
        (None, None) => return Vec::new(),
    };
    split_roles(raw)
}

pub(crate) fn split_roles(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn highest_role(roles: &[String]) -> RoleRank {
    for (rank, namespaced, bare) in PRECEDENCE {
        if roles.iter().any(|r| r == namespaced || r == bare) {
            return *rank;
        }
    }
    RoleRank::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(ext: Option<&str>, roles: Option<&str>) -> LaunchContext {
        LaunchContext {
            ext_roles: ext.map(str::to_string),
            roles: roles.map(str::to_string),
            ..LaunchContext::default()
        }
    }

    #[test]
    fn test_ext_roles_take_precedence() {
        let c = ctx(Some("Learner"), Some("Instructor"));
        assert_eq!(parse_roles(&c), vec!["Learner"]);
    }

    #[test]
    fn test_present_but_empty_ext_roles_still_win() {
        let c = ctx(Some(""), Some("Instructor"));
        assert!(parse_roles(&c).is_empty());
    }

    #[test]
    fn test_roles_fallback_and_trimming() {
        let c = ctx(None, Some(" Learner , ,urn:lti:role:ims/lis/Instructor,"));
        assert_eq!(
            parse_roles(&c),
            vec!["Learner", "urn:lti:role:ims/lis/Instructor"]
        );
        assert!(parse_roles(&ctx(None, None)).is_empty());
    }

    #[test]
    fn test_instructor_beats_learner() {
        let roles = split_roles("Learner,Instructor");
        assert_eq!(highest_role(&roles), RoleRank::Teacher);
    }

    #[test]
    fn test_namespaced_and_bare_admin() {
        assert_eq!(
            highest_role(&split_roles("urn:lti:instrole:ims/lis/Administrator")),
            RoleRank::Admin
        );
        assert_eq!(
            highest_role(&split_roles("Learner,Administrator")),
            RoleRank::Admin
        );
    }

    #[test]
    fn test_unknown_roles_are_other() {
        assert_eq!(highest_role(&split_roles("Mentor,Guest")), RoleRank::Other);
        assert_eq!(highest_role(&[]), RoleRank::Other);
    }

    #[test]
    fn test_rank_order_is_total() {
        assert!(RoleRank::Admin > RoleRank::Teacher);
        assert!(RoleRank::Teacher > RoleRank::Designer);
        assert!(RoleRank::Designer > RoleRank::Ta);
        assert!(RoleRank::Ta > RoleRank::Learner);
        assert!(RoleRank::Learner > RoleRank::Other);
        assert_eq!(
            highest_role(&split_roles("TeachingAssistant,ContentDeveloper")),
            RoleRank::Designer
        );
    }
}
