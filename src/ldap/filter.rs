use anyhow::{anyhow, Result};
use ldap3_proto::{LdapFilter, LdapSearchScope};

use crate::directory::Entry;
use crate::ldap::dn::DN;

use super::dn::AttributeName;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Equality(AttributeName, String),
    Present(AttributeName),
}

impl Filter {
    pub fn evaluate(&self, entry: &Entry) -> bool {
        return match self {
            Filter::And(filters) => filters.iter()
                .all(|filter| filter.evaluate(entry)),

            Filter::Or(filters) => filters.iter()
                .any(|filter| filter.evaluate(entry)),

            Filter::Not(filter) => !filter.evaluate(entry),

            // Values are matched ignoring case, like most directory string attributes
            Filter::Equality(attribute, expected) => entry.values(attribute).iter()
                .any(|value| value.eq_ignore_ascii_case(expected)),

            Filter::Present(attribute) => entry.has(attribute),
        };
    }
}

impl TryFrom<&LdapFilter> for Filter {
    type Error = anyhow::Error;

    fn try_from(value: &LdapFilter) -> std::result::Result<Self, Self::Error> {
        return match value {
            LdapFilter::And(filters) => Ok(Self::And(filters.iter().map(Filter::try_from).collect::<Result<_>>()?)),
            LdapFilter::Or(filters) => Ok(Self::Or(filters.iter().map(Filter::try_from).collect::<Result<_>>()?)),
            LdapFilter::Not(filter) => Ok(Self::Not(Box::new(Filter::try_from(filter.as_ref())?))),
            LdapFilter::Equality(attribute, value) => Ok(Self::Equality(attribute.parse()?, value.to_string())),
            LdapFilter::Substring(attribute, _) => Err(anyhow!("Substring filters are not supported: {}", attribute)),
            LdapFilter::Present(attribute) => Ok(Self::Present(attribute.parse()?)),
        };
    }
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub base: DN,
    pub scope: LdapSearchScope,
}

impl Scope {
    pub fn matches(&self, entry: &Entry) -> bool {
        return match self.scope {
            LdapSearchScope::Base => entry.dn() == &self.base,
            LdapSearchScope::OneLevel => entry.dn().parent() == self.base,
            LdapSearchScope::Subtree => entry.dn().is_descendant_of(&self.base),
        };
    }

    pub fn is_root_dse(&self) -> bool {
        return self.base == DN::ROOT && self.scope == LdapSearchScope::Base;
    }
}
