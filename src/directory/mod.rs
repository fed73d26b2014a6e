use std::collections::HashMap;

use anyhow::{bail, Result};
use tracing::trace;

pub use self::entry::Entry;
use self::entry::{ATTR_NAMING_CONTEXTS, ATTR_OBJECT_CLASS, ATTR_SUPPORTED_LDAP_VERSION, ATTR_USER_PASSWORD, ATTR_VENDOR_NAME, ATTR_VENDOR_VERSION};
pub use self::provisioning::Source;

use crate::ldap::dn::{AttributeName, DN};
use crate::ldap::filter::{Filter, Scope};

pub mod entry;
pub mod ldif;
pub mod provisioning;
mod password;

/// Outcome of comparing an attribute value of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Match,
    Mismatch,
    NoSuchAttribute,
    NoSuchEntry,
}

/// In-memory directory information tree.
///
/// Entries are kept in insertion order, which guarantees parents are always listed before their
/// children.
#[derive(Debug)]
pub struct Directory {
    base_dns: Vec<DN>,

    entries: Vec<Entry>,
    index: HashMap<DN, usize>,
}

impl Directory {
    pub fn new(base_dns: impl IntoIterator<Item=DN>) -> Result<Self> {
        let base_dns: Vec<DN> = base_dns.into_iter().collect();

        if base_dns.is_empty() {
            bail!("At least one base DN is required");
        }

        for (i, base_dn) in base_dns.iter().enumerate() {
            if base_dn.is_root() {
                bail!("The empty DN can not be used as base DN");
            }

            if let Some(other) = base_dns[..i].iter().find(|other| base_dn.is_descendant_of(other) || other.is_descendant_of(base_dn)) {
                bail!("Base DN '{}' conflicts with base DN '{}'", base_dn, other);
            }
        }

        return Ok(Self {
            base_dns,
            entries: Vec::new(),
            index: HashMap::new(),
        });
    }

    pub fn base_dns(&self) -> &[DN] {
        return &self.base_dns;
    }

    pub fn len(&self) -> usize {
        return self.entries.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.entries.is_empty();
    }

    pub fn get(&self, dn: &DN) -> Option<&Entry> {
        return self.index.get(dn)
            .map(|&i| &self.entries[i]);
    }

    pub fn entries(&self) -> impl Iterator<Item=&Entry> {
        return self.entries.iter();
    }

    pub fn add(&mut self, entry: Entry) -> Result<()> {
        let dn = entry.dn();

        if self.index.contains_key(dn) {
            bail!("Entry '{}' already exists", dn);
        }

        if !self.base_dns.contains(dn) {
            if !self.base_dns.iter().any(|base_dn| dn.is_descendant_of(base_dn)) {
                bail!("Entry '{}' is not within any of the base DNs", dn);
            }

            if !self.index.contains_key(&dn.parent()) {
                bail!("Parent of entry '{}' does not exist", dn);
            }
        }

        if !entry.has(&ATTR_OBJECT_CLASS) {
            bail!("Entry '{}' has no objectClass", dn);
        }

        if let Some(rdn) = dn.rdn() {
            for attribute in rdn.iter() {
                let present = entry.get(attribute.name())
                    .map_or(false, |values| values.iter().any(|value| value.eq_ignore_ascii_case(attribute.value())));
                if !present {
                    bail!("Entry '{}' does not contain its naming attribute '{}'", dn, attribute);
                }
            }
        }

        trace!("Adding entry '{}'", dn);

        self.index.insert(dn.clone(), self.entries.len());
        self.entries.push(entry);

        return Ok(());
    }

    /// Imports all entries of an LDIF document, returning the number of imported entries.
    ///
    /// The import is atomic: if any entry can not be added, all entries added by this import are
    /// removed again.
    pub fn import_ldif(&mut self, ldif: &str) -> Result<usize> {
        let entries = ldif::parse(ldif)?;

        let checkpoint = self.entries.len();
        for entry in entries {
            if let Err(err) = self.add(entry) {
                for entry in self.entries.drain(checkpoint..) {
                    self.index.remove(entry.dn());
                }
                return Err(err);
            }
        }

        return Ok(self.entries.len() - checkpoint);
    }

    /// Searches for entries in scope matching the filter.
    ///
    /// Returns `None` if the search base does not exist.
    pub fn search<'a>(&'a self, scope: &'a Scope, filter: &'a Filter) -> Option<impl Iterator<Item=&'a Entry> + 'a> {
        if !scope.base.is_root() && !self.index.contains_key(&scope.base) {
            return None;
        }

        return Some(self.entries.iter()
            .filter(move |entry| scope.matches(entry))
            .filter(move |entry| filter.evaluate(entry)));
    }

    /// Checks the password for the entry with the given DN.
    pub fn bind(&self, dn: &DN, password: &[u8]) -> bool {
        let entry = if let Some(entry) = self.get(dn) { entry } else {
            return false;
        };

        return entry.get(&ATTR_USER_PASSWORD)
            .unwrap_or_default()
            .iter()
            .any(|stored| password::verify(stored, password));
    }

    /// Checks if the entry with the given DN holds the value for the attribute.
    ///
    /// Passwords are compared like binds, all other values ASCII case-insensitively.
    pub fn compare(&self, dn: &DN, name: &AttributeName, value: &str) -> Comparison {
        let entry = if let Some(entry) = self.get(dn) { entry } else {
            return Comparison::NoSuchEntry;
        };

        let values = entry.values(name);
        if values.is_empty() {
            return Comparison::NoSuchAttribute;
        }

        let matches = if name == &ATTR_USER_PASSWORD {
            values.iter().any(|stored| password::verify(stored, value.as_bytes()))
        } else {
            values.iter().any(|stored| stored.eq_ignore_ascii_case(value))
        };

        return if matches { Comparison::Match } else { Comparison::Mismatch };
    }

    /// The root DSE describing this server
    pub fn root_dse(&self) -> Entry {
        let mut entry = Entry::new(DN::ROOT);
        entry.add(ATTR_OBJECT_CLASS, "top");
        for base_dn in &self.base_dns {
            entry.add(ATTR_NAMING_CONTEXTS, base_dn.to_string());
        }
        entry.add(ATTR_SUPPORTED_LDAP_VERSION, "3");
        entry.add(ATTR_VENDOR_NAME, env!("CARGO_PKG_NAME"));
        entry.add(ATTR_VENDOR_VERSION, env!("CARGO_PKG_VERSION"));

        return entry;
    }
}
