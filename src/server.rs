use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::directory::{Directory, Source};
use crate::ldap;
use crate::ldap::dn::DN;
use crate::lifecycle::Hook;
use crate::registry::Registry;

struct Running {
    addr: SocketAddr,

    directory: Arc<RwLock<Directory>>,

    shutdown: oneshot::Sender<()>,
    task: JoinHandle<Result<()>>,

    published: bool,
}

/// In-memory LDAP server started and stopped with the process lifecycle.
pub struct EmbeddedLdapServer {
    config: ldap::Config,
    registry: Registry,

    running: Option<Running>,
}

impl EmbeddedLdapServer {
    /// Registry key the bound port is published under
    pub const PORT_PROPERTY: &'static str = "embedded_ldap.server.port";

    pub const PRIORITY: i32 = 10;

    /// Creates a server publishing to the process-wide registry
    pub fn new(config: ldap::Config) -> Self {
        return Self::with_registry(config, Registry::global().clone());
    }

    pub fn with_registry(config: ldap::Config, registry: Registry) -> Self {
        return Self {
            config,
            registry,
            running: None,
        };
    }

    pub fn is_running(&self) -> bool {
        return self.running.is_some();
    }

    /// Address the server is listening on, if started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        return self.running.as_ref().map(|running| running.addr);
    }

    pub fn directory(&self) -> Option<Arc<RwLock<Directory>>> {
        return self.running.as_ref().map(|running| running.directory.clone());
    }

    async fn listen_addr(&self) -> Result<SocketAddr> {
        if self.config.port == 0 {
            return Ok(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)));
        }

        let host = if let Some(host) = &self.config.host { host } else {
            return Ok(SocketAddr::from((Ipv4Addr::LOCALHOST, self.config.port)));
        };

        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), self.config.port)).await
            .with_context(|| format!("Resolving host: {}", host))?
            .collect();

        return addrs.iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .with_context(|| format!("No address found for host: {}", host));
    }

    async fn create_directory(&self) -> Result<Directory> {
        let base_dns = self.config.base_dn.split('|')
            .map(|base_dn| DN::from_str(base_dn.trim())
                .with_context(|| format!("Invalid base DN: {:?}", base_dn)))
            .collect::<Result<Vec<_>>>()?;

        let mut directory = Directory::new(base_dns)
            .with_context(|| format!("Invalid base DN: {:?}", self.config.base_dn))?;

        if self.config.provisioning {
            let source = Source::resolve(&self.config.provisioning_source).await;
            debug!("Provisioning from {:?}", source);

            source.provision(&mut directory).await
                .context("Provisioning failed")?;
        }

        return Ok(directory);
    }

    async fn listen(&self) -> Result<(TcpListener, Directory)> {
        let addr = self.listen_addr().await?;
        let directory = self.create_directory().await?;

        let listener = TcpListener::bind(addr).await
            .with_context(|| format!("Listening on {}", addr))?;

        return Ok((listener, directory));
    }
}

#[async_trait]
impl Hook for EmbeddedLdapServer {
    fn name(&self) -> &str {
        return "embedded LDAP server";
    }

    fn priority(&self) -> i32 {
        return Self::PRIORITY;
    }

    async fn start(&mut self) -> Result<()> {
        if !self.config.active {
            debug!("LDAP server is not active");
            return Ok(());
        }

        if self.running.is_some() {
            bail!("LDAP server is already running");
        }

        let (listener, directory) = self.listen().await
            .context("Failed to start LDAP server")?;
        let addr = listener.local_addr()
            .context("Failed to start LDAP server")?;

        info!("Starting LDAP server on port {}", addr.port());

        let directory = Arc::new(RwLock::new(directory));
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(ldap::serve(listener, directory.clone(), shutdown_rx));

        let published = self.config.publish_port;
        if published {
            self.registry.set(Self::PORT_PROPERTY, addr.port().to_string());
        }

        self.running = Some(Running {
            addr,
            directory,
            shutdown,
            task,
            published,
        });

        return Ok(());
    }

    async fn stop(&mut self) -> Result<()> {
        let running = if let Some(running) = self.running.take() { running } else {
            return Ok(());
        };

        info!("Closing LDAP server");

        if running.shutdown.send(()).is_err() {
            debug!("LDAP server has already terminated");
        }

        let result = running.task.await;

        if running.published {
            self.registry.remove(Self::PORT_PROPERTY);
        }

        result.context("LDAP server task failed")??;

        return Ok(());
    }
}
