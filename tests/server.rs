use ldap3::{Ldap, LdapConnAsync, Scope, SearchEntry};

use embedded_ldap::ldap::Config;
use embedded_ldap::{EmbeddedLdapServer, Hook, Lifecycle, Registry};

const ALICE: &str = "uid=alice,ou=people,dc=demo,dc=com";

async fn connect(port: u16) -> Ldap {
    let (conn, ldap) = LdapConnAsync::new(&format!("ldap://127.0.0.1:{}", port)).await
        .expect("Connecting to LDAP server");
    tokio::spawn(async move {
        let _ = conn.drive().await;
    });
    return ldap;
}

async fn start() -> (EmbeddedLdapServer, u16) {
    let registry = Registry::default();

    let mut server = EmbeddedLdapServer::with_registry(Config {
        port: 0,
        publish_port: true,
        ..Config::default()
    }, registry.clone());
    server.start().await.unwrap();

    let port = registry.get(EmbeddedLdapServer::PORT_PROPERTY)
        .expect("Port is published")
        .parse()
        .unwrap();

    return (server, port);
}

#[tokio::test]
async fn ensure_server_is_up() {
    let (mut server, port) = start().await;
    let mut ldap = connect(port).await;

    let (entries, _) = ldap.search("dc=demo,dc=com", Scope::Base, "(dc=demo)", vec!["*"]).await.unwrap()
        .success().unwrap();
    assert_eq!(entries.len(), 1);

    let entry = SearchEntry::construct(entries.into_iter().next().unwrap());
    assert_eq!(entry.dn, "dc=demo,dc=com");
    assert_eq!(entry.attrs["dc"], vec!["demo"]);

    ldap.unbind().await.unwrap();
    server.stop().await.unwrap();
}

#[tokio::test]
async fn search_subtree_with_attribute_selection() {
    let (mut server, port) = start().await;
    let mut ldap = connect(port).await;

    let (entries, _) = ldap.search("ou=people,dc=demo,dc=com", Scope::Subtree, "(&(objectClass=inetOrgPerson)(mail=*))", vec!["cn", "mail"]).await.unwrap()
        .success().unwrap();

    let mut entries: Vec<SearchEntry> = entries.into_iter().map(SearchEntry::construct).collect();
    entries.sort_by(|a, b| a.dn.cmp(&b.dn));

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].dn, ALICE);
    assert_eq!(entries[0].attrs.len(), 2);
    assert_eq!(entries[0].attrs["cn"], vec!["Alice Liddell"]);
    assert_eq!(entries[0].attrs["mail"], vec!["alice@demo.com"]);
    assert_eq!(entries[1].dn, "uid=bob,ou=people,dc=demo,dc=com");

    ldap.unbind().await.unwrap();
    server.stop().await.unwrap();
}

#[tokio::test]
async fn search_errors() {
    let (mut server, port) = start().await;
    let mut ldap = connect(port).await;

    let missing = ldap.search("ou=missing,dc=demo,dc=com", Scope::Subtree, "(objectClass=*)", vec!["*"]).await.unwrap();
    assert!(missing.0.is_empty());
    assert_eq!(missing.1.rc, 32);

    let substring = ldap.search("dc=demo,dc=com", Scope::Subtree, "(cn=Ali*)", vec!["*"]).await.unwrap();
    assert!(substring.0.is_empty());
    assert_ne!(substring.1.rc, 0);

    ldap.unbind().await.unwrap();
    server.stop().await.unwrap();
}

#[tokio::test]
async fn root_dse() {
    let (mut server, port) = start().await;
    let mut ldap = connect(port).await;

    let (entries, _) = ldap.search("", Scope::Base, "(objectClass=*)", vec!["namingContexts", "supportedLDAPVersion"]).await.unwrap()
        .success().unwrap();
    assert_eq!(entries.len(), 1);

    let entry = SearchEntry::construct(entries.into_iter().next().unwrap());
    assert_eq!(entry.dn, "");
    assert_eq!(entry.attrs["namingContexts"], vec!["dc=demo,dc=com"]);
    assert_eq!(entry.attrs["supportedLDAPVersion"], vec!["3"]);

    ldap.unbind().await.unwrap();
    server.stop().await.unwrap();
}

#[tokio::test]
async fn simple_bind() {
    let (mut server, port) = start().await;
    let mut ldap = connect(port).await;

    assert_eq!(ldap.simple_bind(ALICE, "alice-secret").await.unwrap().rc, 0);
    assert_eq!(ldap.simple_bind(ALICE, "wrong").await.unwrap().rc, 49);
    assert_eq!(ldap.simple_bind("uid=eve,ou=people,dc=demo,dc=com", "alice-secret").await.unwrap().rc, 49);
    assert_eq!(ldap.simple_bind("", "").await.unwrap().rc, 0);

    ldap.unbind().await.unwrap();
    server.stop().await.unwrap();
}

#[tokio::test]
async fn compare() {
    let (mut server, port) = start().await;
    let mut ldap = connect(port).await;

    assert!(ldap.compare("uid=bob,ou=people,dc=demo,dc=com", "uid", "bob").await.unwrap().equal().unwrap());
    assert!(!ldap.compare("uid=bob,ou=people,dc=demo,dc=com", "uid", "alice").await.unwrap().equal().unwrap());
    assert!(ldap.compare(ALICE, "userPassword", "alice-secret").await.unwrap().equal().unwrap());

    assert_eq!(ldap.compare(ALICE, "telephoneNumber", "42").await.unwrap().0.rc, 16);
    assert_eq!(ldap.compare("uid=eve,ou=people,dc=demo,dc=com", "uid", "eve").await.unwrap().0.rc, 32);
    assert_eq!(ldap.compare("uid=eve,", "uid", "eve").await.unwrap().0.rc, 34);

    ldap.unbind().await.unwrap();
    server.stop().await.unwrap();
}

#[tokio::test]
async fn unsupported_operations_keep_session() {
    let (mut server, port) = start().await;
    let mut ldap = connect(port).await;

    assert_eq!(ldap.delete("uid=bob,ou=people,dc=demo,dc=com").await.unwrap().rc, 53);

    let ordering = ldap.search("dc=demo,dc=com", Scope::Subtree, "(uid>=a)", vec!["*"]).await.unwrap();
    assert!(ordering.0.is_empty());
    assert_eq!(ordering.1.rc, 53);

    // The session is still usable and nothing was deleted
    let (entries, _) = ldap.search("ou=people,dc=demo,dc=com", Scope::OneLevel, "(uid=bob)", vec!["uid"]).await.unwrap()
        .success().unwrap();
    assert_eq!(entries.len(), 1);

    ldap.unbind().await.unwrap();
    server.stop().await.unwrap();
}

#[tokio::test]
async fn stop_closes_listener() {
    let (mut server, port) = start().await;
    server.stop().await.unwrap();

    assert!(LdapConnAsync::new(&format!("ldap://127.0.0.1:{}", port)).await.is_err());
}

#[tokio::test]
async fn lifecycle_publishes_port_globally() {
    let mut lifecycle = Lifecycle::new();
    lifecycle.register(EmbeddedLdapServer::new(Config {
        port: 0,
        publish_port: true,
        ..Config::default()
    }));

    lifecycle.start().await.unwrap();

    let port: u16 = Registry::global().get(EmbeddedLdapServer::PORT_PROPERTY)
        .expect("Port is published")
        .parse()
        .unwrap();

    let mut ldap = connect(port).await;
    let (entries, _) = ldap.search("dc=demo,dc=com", Scope::Subtree, "(uid=alice)", vec!["uid"]).await.unwrap()
        .success().unwrap();
    assert_eq!(entries.len(), 1);
    ldap.unbind().await.unwrap();

    lifecycle.stop().await.unwrap();

    assert_eq!(Registry::global().get(EmbeddedLdapServer::PORT_PROPERTY), None);
}

#[tokio::test]
async fn inactive_server_does_not_listen() {
    let registry = Registry::default();

    let mut lifecycle = Lifecycle::new();
    lifecycle.register(EmbeddedLdapServer::with_registry(Config {
        active: false,
        port: 0,
        publish_port: true,
        ..Config::default()
    }, registry.clone()));

    lifecycle.start().await.unwrap();
    assert_eq!(registry.get(EmbeddedLdapServer::PORT_PROPERTY), None);
    lifecycle.stop().await.unwrap();
}
