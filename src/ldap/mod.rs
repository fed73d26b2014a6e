use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use ldap3_proto::{DisconnectionNotice, LdapPartialAttribute, LdapResultCode, LdapSearchResultEntry, SearchRequest, ServerOps, SimpleBindRequest, UnbindRequest, WhoamiRequest};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, trace, warn};

use crate::directory::{Comparison, Directory, Entry};

pub use self::config::Config;
use self::attributes::Selection;
use self::codec::{Codec, CompareRequest, Request, Response, ABANDON_REQUEST, BIND_REQUEST};
use self::dn::{AttributeName, DN};
use self::filter::{Filter, Scope};

pub mod dn;
pub mod filter;
mod attributes;
mod codec;
mod config;

/// Pause after a failed accept, e.g. when running out of file descriptors
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

enum Binding {
    Unbound,
    Bound(DN),
    Anonymous,
}

struct Session {
    addr: SocketAddr,

    directory: Arc<RwLock<Directory>>,

    binding: Binding,
}

fn result_entry(entry: &Entry, selection: &Selection) -> LdapSearchResultEntry {
    let attributes = selection.select(entry)
        .into_iter()
        .map(|(atype, vals)| LdapPartialAttribute {
            atype,
            vals,
        })
        .collect();

    return LdapSearchResultEntry {
        dn: entry.dn().to_string(),
        attributes,
    };
}

impl Session {
    pub async fn do_search(&mut self, req: SearchRequest) -> Result<Vec<Response>> {
        let base = match DN::from_str(&req.base) {
            Ok(base) => base,
            Err(err) => return Ok(vec![req.gen_error(LdapResultCode::InvalidDNSyntax, err.to_string()).into()]),
        };

        let scope = Scope {
            base,
            scope: req.scope.clone(),
        };

        let filter = match Filter::try_from(&req.filter) {
            Ok(filter) => filter,
            Err(err) => return Ok(vec![req.gen_error(LdapResultCode::InvalidAttributeSyntax, err.to_string()).into()])
        };

        let selection = Selection::parse(&req.attrs);

        let directory = self.directory.read().await;

        let mut results: Vec<Response> = Vec::new();

        if scope.is_root_dse() {
            let root_dse = directory.root_dse();
            if filter.evaluate(&root_dse) {
                results.push(req.gen_result_entry(result_entry(&root_dse, &selection)).into());
            }

            results.push(req.gen_success().into());
            return Ok(results);
        }

        let entries = if let Some(entries) = directory.search(&scope, &filter) { entries } else {
            debug!("Search base not found: {}", scope.base);
            return Ok(vec![req.gen_error(LdapResultCode::NoSuchObject, format!("No such entry: {}", scope.base)).into()]);
        };

        results.extend(entries
            .map(|entry| result_entry(entry, &selection))
            .map(|entry| req.gen_result_entry(entry).into()));

        trace!("Search from {} returned {} entries", self.addr, results.len());

        results.push(req.gen_success().into());

        return Ok(results);
    }

    pub async fn do_bind(&mut self, req: SimpleBindRequest) -> Result<Vec<Response>> {
        debug!("Bind Request for {:?}", req.dn);

        if req.dn.is_empty() {
            debug!("Anonymous bind");
            self.binding = Binding::Anonymous;
            return Ok(vec![req.gen_success().into()]);
        }

        let dn = match DN::from_str(&req.dn) {
            Ok(dn) => dn,
            Err(err) => {
                debug!("Invalid bind DN: {}", err);
                self.binding = Binding::Unbound;
                return Ok(vec![req.gen_invalid_cred().into()]);
            }
        };
        trace!("Parsed bind DN: {:?}", dn);

        let directory = self.directory.read().await;

        if !directory.bind(&dn, req.pw.as_bytes()) {
            debug!("Invalid credentials for {}", dn);
            self.binding = Binding::Unbound;
            return Ok(vec![req.gen_invalid_cred().into()]);
        }

        self.binding = Binding::Bound(dn);
        return Ok(vec![req.gen_success().into()]);
    }

    pub async fn do_unbind(&mut self, _req: UnbindRequest) -> Result<()> {
        self.binding = Binding::Unbound;

        // No need to notify on unbind (per rfc4511)
        return Ok(());
    }

    pub async fn do_whoami(&mut self, req: WhoamiRequest) -> Result<Vec<Response>> {
        return Ok(match &self.binding {
            Binding::Bound(dn) => vec![req.gen_success(&format!("dn: {}", dn)).into()],
            Binding::Unbound | Binding::Anonymous => vec![req.gen_success("").into()],
        });
    }

    pub async fn do_compare(&mut self, req: CompareRequest) -> Result<Vec<Response>> {
        let dn = match DN::from_str(&req.dn) {
            Ok(dn) => dn,
            Err(err) => return Ok(vec![req.gen_result(LdapResultCode::InvalidDNSyntax, err.to_string())]),
        };

        let name = match AttributeName::from_str(&req.atype) {
            Ok(name) => name,
            Err(err) => return Ok(vec![req.gen_result(LdapResultCode::UndefinedAttributeType, err.to_string())]),
        };

        let directory = self.directory.read().await;

        let response = match directory.compare(&dn, &name, &req.val) {
            Comparison::Match => req.gen_result(LdapResultCode::CompareTrue, ""),
            Comparison::Mismatch => req.gen_result(LdapResultCode::CompareFalse, ""),
            Comparison::NoSuchAttribute => req.gen_result(LdapResultCode::NoSuchAttribute, format!("No attribute {} in {}", name, dn)),
            Comparison::NoSuchEntry => req.gen_result(LdapResultCode::NoSuchObject, format!("No such entry: {}", dn)),
        };

        return Ok(vec![response]);
    }

    /// Answers a request for an operation this server does not implement.
    ///
    /// Returns `None` if the op is not a request at all, which ends the session.
    pub fn do_unsupported(&mut self, msgid: i32, op: u64) -> Option<Vec<Response>> {
        if op == ABANDON_REQUEST {
            // Operations are answered synchronously, so there is nothing left to abandon
            return Some(vec![]);
        }

        warn!("Unsupported operation {} from client {}", op, self.addr);

        let code = if op == BIND_REQUEST {
            LdapResultCode::AuthMethodNotSupported
        } else {
            LdapResultCode::UnwillingToPerform
        };

        return Response::result_for(msgid, op, code, "Operation not supported")
            .map(|response| vec![response]);
    }
}

async fn serve_client(socket: TcpStream,
                      addr: SocketAddr,
                      directory: Arc<RwLock<Directory>>) -> Result<()> {
    let (r, w) = tokio::io::split(socket);
    let mut r = FramedRead::new(r, Codec);
    let mut w = FramedWrite::new(w, Codec);

    let mut session = Session {
        addr,
        directory,
        binding: Binding::Unbound,
    };

    while let Some(req) = r.next().await {
        let req = req.with_context(|| format!("Invalid request from client {}", addr))?;

        debug!("Got request: {:?}", req);
        let responses = match req {
            Request::Operation(ServerOps::Search(req)) => session.do_search(req).await?,
            Request::Operation(ServerOps::SimpleBind(req)) => session.do_bind(req).await?,
            Request::Operation(ServerOps::Whoami(req)) => session.do_whoami(req).await?,
            Request::Operation(ServerOps::Unbind(req)) => {
                session.do_unbind(req).await?;
                break;
            }
            Request::Compare(req) => session.do_compare(req).await?,
            Request::Unsupported { msgid, op } => {
                if let Some(responses) = session.do_unsupported(msgid, op) {
                    responses
                } else {
                    w.send(Response::from(DisconnectionNotice::gen(LdapResultCode::ProtocolError, "Unexpected protocol operation"))).await?;
                    break;
                }
            }
        };

        for response in responses {
            debug!("Responding with {:?}", response);
            w.send(response).await?;
        }

        w.flush().await?;
    }

    debug!("Client disconnected {}", addr);

    return Ok(());
}

#[async_trait]
trait Acceptor: Send + Sync {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
}

#[async_trait]
impl Acceptor for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        return TcpListener::accept(self).await;
    }
}

/// Accepts LDAP clients on the listener until `shutdown` completes.
///
/// All client sessions are aborted once the server shuts down.
pub async fn serve(listener: TcpListener,
                   directory: Arc<RwLock<Directory>>,
                   shutdown: impl Future) -> Result<()> {
    return accept_loop(&listener, directory, shutdown).await;
}

async fn accept_loop(acceptor: &impl Acceptor,
                     directory: Arc<RwLock<Directory>>,
                     shutdown: impl Future) -> Result<()> {
    tokio::pin!(shutdown);

    let mut sessions = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!("Server is shutting down");
                break;
            }

            accepted = acceptor.accept() => match accepted {
                Ok((socket, addr)) => {
                    debug!("Client connected {}", addr);
                    sessions.spawn(serve_client(socket,
                                                addr,
                                                directory.clone()));
                }

                Err(err) => {
                    error!("Failed to accept connection: {}", err);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },

            Some(finished) = sessions.join_next() => {
                match finished {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => warn!("Client session failed: {:#}", err),
                    Err(err) => error!("Client session panicked: {}", err),
                }
            }
        }
    }

    sessions.shutdown().await;

    return Ok(());
}
