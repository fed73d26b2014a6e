use std::fmt;

use crate::ldap::dn::{AttributeName, DN};

pub const ATTR_OBJECT_CLASS: AttributeName = AttributeName::from_static("objectClass");
pub const ATTR_ENTRY_DN: AttributeName = AttributeName::from_static("entryDN");
pub const ATTR_USER_PASSWORD: AttributeName = AttributeName::from_static("userPassword");
pub const ATTR_NAMING_CONTEXTS: AttributeName = AttributeName::from_static("namingContexts");
pub const ATTR_SUPPORTED_LDAP_VERSION: AttributeName = AttributeName::from_static("supportedLDAPVersion");
pub const ATTR_VENDOR_NAME: AttributeName = AttributeName::from_static("vendorName");
pub const ATTR_VENDOR_VERSION: AttributeName = AttributeName::from_static("vendorVersion");

/// Attributes computed by the server instead of being stored with the entry
pub const OPERATIONAL_ATTRIBUTES: &[AttributeName] = &[
    ATTR_ENTRY_DN,
];

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    dn: DN,
    attributes: Vec<(AttributeName, Vec<String>)>,
}

impl Entry {
    pub fn new(dn: DN) -> Self {
        return Self {
            dn,
            attributes: Vec::new(),
        };
    }

    pub fn dn(&self) -> &DN {
        return &self.dn;
    }

    /// Adds a value to the attribute, creating the attribute if required.
    ///
    /// Values already present are not added twice.
    pub fn add(&mut self, name: AttributeName, value: impl Into<String>) {
        let value = value.into();

        match self.attributes.iter_mut().find(|(existing, _)| existing == &name) {
            Some((_, values)) => {
                if !values.contains(&value) {
                    values.push(value);
                }
            }

            None => {
                self.attributes.push((name, vec![value]));
            }
        }
    }

    pub fn with(mut self, name: impl Into<AttributeName>, value: impl Into<String>) -> Self {
        self.add(name.into(), value);
        return self;
    }

    /// Stored values of the attribute
    pub fn get(&self, name: &AttributeName) -> Option<&[String]> {
        return self.attributes.iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, values)| values.as_slice());
    }

    /// Values of the attribute including operational attributes
    pub fn values(&self, name: &AttributeName) -> Vec<String> {
        if name == &ATTR_ENTRY_DN {
            return vec![self.dn.to_string()];
        }

        return self.get(name)
            .map(<[String]>::to_vec)
            .unwrap_or_default();
    }

    pub fn has(&self, name: &AttributeName) -> bool {
        return name == &ATTR_ENTRY_DN || self.get(name).is_some();
    }

    pub fn attributes(&self) -> impl Iterator<Item=(&AttributeName, &[String])> {
        return self.attributes.iter()
            .map(|(name, values)| (name, values.as_slice()));
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "dn: {}", self.dn)?;
        for (name, values) in &self.attributes {
            for value in values {
                writeln!(f, "{}: {}", name, value)?;
            }
        }

        return Ok(());
    }
}
