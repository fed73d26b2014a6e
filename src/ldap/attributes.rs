use tracing::debug;

use crate::directory::entry::OPERATIONAL_ATTRIBUTES;
use crate::directory::Entry;

use super::dn::AttributeName;

/// Attributes requested by a search
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    user: bool,
    operational: bool,
    named: Vec<AttributeName>,
}

impl Selection {
    pub fn parse(attrs: &[String]) -> Self {
        let mut selection = Self {
            user: attrs.is_empty(),
            operational: false,
            named: Vec::new(),
        };

        for attr in attrs {
            match attr.as_str() {
                "*" => selection.user = true,
                "+" => selection.operational = true,
                "1.1" => {}
                name => match name.parse() {
                    Ok(name) => selection.named.push(name),
                    Err(err) => debug!("Ignoring invalid requested attribute {:?}: {}", name, err),
                },
            }
        }

        return selection;
    }

    fn includes(&self, name: &AttributeName, operational: bool) -> bool {
        let all = if operational { self.operational } else { self.user };
        return all || self.named.contains(name);
    }

    /// Selected attributes of the entry with their values
    pub fn select(&self, entry: &Entry) -> Vec<(String, Vec<String>)> {
        let user = entry.attributes()
            .filter(|(name, _)| self.includes(name, false))
            .map(|(name, values)| (name.to_string(), values.to_vec()));

        let operational = OPERATIONAL_ATTRIBUTES.iter()
            .filter(|name| self.includes(name, true))
            .map(|name| (name.to_string(), entry.values(name)));

        return user.chain(operational).collect();
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use crate::ldap::dn::DN;

    use super::*;

    fn entry() -> Entry {
        return Entry::new(DN::from_str("uid=alice,dc=demo").unwrap())
            .with("objectClass", "person")
            .with("uid", "alice")
            .with("cn", "Alice");
    }

    fn select(attrs: &[&str]) -> Vec<String> {
        let attrs: Vec<String> = attrs.iter().map(ToString::to_string).collect();
        return Selection::parse(&attrs)
            .select(&entry())
            .into_iter()
            .map(|(name, _)| name)
            .collect();
    }

    #[test]
    fn test_select() {
        assert_eq!(select(&[]), vec!["objectClass", "uid", "cn"]);
        assert_eq!(select(&["*"]), vec!["objectClass", "uid", "cn"]);
        assert_eq!(select(&["+"]), vec!["entryDN"]);
        assert_eq!(select(&["*", "+"]), vec!["objectClass", "uid", "cn", "entryDN"]);
        assert_eq!(select(&["1.1"]), Vec::<String>::new());
        assert_eq!(select(&["CN", "entrydn", "mail"]), vec!["cn", "entryDN"]);
        assert_eq!(select(&["cn;binary"]), Vec::<String>::new());
    }

    #[test]
    fn test_values() {
        let selection = Selection::parse(&[String::from("uid"), String::from("entryDN")]);

        assert_eq!(selection.select(&entry()), vec![
            (String::from("uid"), vec![String::from("alice")]),
            (String::from("entryDN"), vec![String::from("uid=alice,dc=demo")]),
        ]);
    }
}
