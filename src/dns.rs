// Checking that a white-label hostname is delegated to the service.
// The hostname must be a CNAME for `whitelabel.aboutmy.email`. Before
// looking at it we resolve a known test record, so a broken local
// resolver is not reported as a misconfigured hostname.

use crate::error::{Error, Result};
use hickory_resolver::{
    config::ResolverConfig,
    name_server::TokioConnectionProvider,
    proto::rr::{RData, RecordType},
    system_conf, ResolveError, TokioResolver,
};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

pub const WHITELABEL_TARGET: &str = "whitelabel.aboutmy.email";
pub const TEST_NAME: &str = "cnametest.aboutmy.email";
pub const TEST_TARGET: &str = "aboutmy.email.";

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(15);

/// What the hostname's CNAME says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CnameVerdict {
    /// Points at the white-label service.
    Ok,
    /// Points somewhere else.
    Elsewhere(String),
    /// There is no CNAME at all.
    Missing,
}

/// A failed lookup, with what the user needs to debug it.
#[derive(Debug)]
pub struct LookupFailure {
    pub name: String,
    /// Servers the resolver was configured to ask.
    pub nameservers: Vec<String>,
    pub nxdomain: bool,
    pub error: ResolveError,
}

/// Compare hostnames ignoring case and a trailing root dot.
pub fn host_eq(a: &str, b: &str) -> bool {
    a.trim_end_matches('.')
        .eq_ignore_ascii_case(b.trim_end_matches('.'))
}

/// Decide on the CNAME target found for `hostname`, if any.
pub fn judge(hostname: &str, target: Option<&str>) -> CnameVerdict {
    match target {
        Some(t) if host_eq(t, WHITELABEL_TARGET) => CnameVerdict::Ok,
        Some(t) if !host_eq(t, hostname) => CnameVerdict::Elsewhere(t.to_string()),
        _ => CnameVerdict::Missing,
    }
}

/// Result of a full check.
#[derive(Debug)]
pub enum DnsCheck {
    /// The test record did not resolve as expected.
    ResolverBroken(Option<String>),
    LookupFailed(LookupFailure),
    Verdict(CnameVerdict),
}

pub struct CnameChecker {
    resolver: TokioResolver,
    nameservers: Vec<String>,
}

/// Distinct nameserver addresses in `config`. Each server is usually
/// listed once per protocol.
fn nameservers(config: &ResolverConfig) -> Vec<String> {
    let mut servers: Vec<String> = Vec::new();
    for ns in config.name_servers() {
        let addr = ns.socket_addr.to_string();
        if !servers.contains(&addr) {
            servers.push(addr);
        }
    }
    servers
}

impl CnameChecker {
    /// Use the system resolver configuration.
    pub fn system() -> Result<Self> {
        let (config, opts) = system_conf::read_system_conf()?;
        let nameservers = nameservers(&config);
        debug!(?nameservers, "using system resolver");
        let resolver =
            TokioResolver::builder_with_config(config, TokioConnectionProvider::default())
                .with_options(opts)
                .build();
        Ok(CnameChecker {
            resolver,
            nameservers,
        })
    }

    /// The canonical name `name` points at, following CNAME chains.
    /// `Ok(None)` when the name exists but has no CNAME.
    async fn cname(&self, name: &str) -> std::result::Result<Option<String>, LookupFailure> {
        match self.resolver.lookup(name, RecordType::CNAME).await {
            Ok(lookup) => {
                let target = lookup
                    .iter()
                    .filter_map(|rdata| match rdata {
                        RData::CNAME(cname) => Some(cname.0.to_utf8()),
                        _ => None,
                    })
                    .last();
                debug!(name, ?target, "CNAME lookup");
                Ok(target)
            }
            Err(e) if e.is_no_records_found() && !e.is_nx_domain() => Ok(None),
            Err(e) => Err(LookupFailure {
                name: name.to_string(),
                nameservers: self.nameservers.clone(),
                nxdomain: e.is_nx_domain(),
                error: e,
            }),
        }
    }

    /// Sanity-check the resolver, then judge `hostname`.
    pub async fn check(&self, hostname: &str) -> DnsCheck {
        match self.cname(TEST_NAME).await {
            Ok(Some(target)) if target == TEST_TARGET => {}
            Ok(other) => return DnsCheck::ResolverBroken(other),
            Err(failure) => return DnsCheck::LookupFailed(failure),
        }
        match self.cname(hostname).await {
            Ok(target) => DnsCheck::Verdict(judge(hostname, target.as_deref())),
            Err(failure) => DnsCheck::LookupFailed(failure),
        }
    }
}

/// Run [`CnameChecker::check`] on a private runtime with the overall
/// lookup timeout.
pub fn check_hostname(hostname: &str) -> Result<DnsCheck> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let checker = CnameChecker::system()?;
        within(LOOKUP_TIMEOUT, checker.check(hostname)).await
    })
}

async fn within<F: Future>(limit: Duration, lookup: F) -> Result<F::Output> {
    tokio::time::timeout(limit, lookup)
        .await
        .map_err(|_| Error::DnsTimeout(limit))
}
