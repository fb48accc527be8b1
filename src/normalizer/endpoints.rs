// Endpoint derivation: routing tags -> URLs, label cleanup, domain placeholder rewrite,
// main endpoint from the launch command.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::raw::RawService;

/// Recorded when no routing tag of a service carries a host rule.
pub const MISSING_ENDPOINT: &str = "missing-endpoint";

/// Endpoints are declared with this token in their host and resolved once placed on a node.
pub const DOMAIN_PLACEHOLDER: &str = "${meta.domain}";

/// Appended to the externally exposed `api` endpoint.
pub const API_UI_PATH: &str = "/ui";

/// Deprecated port label -> canonical label.
const LABEL_RENAMES: [(&str, &str); 1] = [("deepaas", "api")];

/// Launcher service -> endpoint label.
const SERVICE_ENDPOINTS: [(&str, &str); 3] =
    [("deepaas", "api"), ("jupyter", "ide"), ("vscode", "ide")];

static HOST_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Host\(`(.+?)`").expect("valid host rule pattern"));
static HOST_SNI_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"HostSNI\(`(.+?)`").expect("valid host SNI rule pattern"));
static LAUNCHER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"deep-start\s+--(\S+)\s*$").expect("valid launcher pattern"));

/// Host named by a routing tag, e.g. "traefik.http.routers.x.rule=Host(`a.example.org`)".
pub fn host_from_tag(tag: &str) -> Option<&str> {
    HOST_RULE
        .captures(tag)
        .or_else(|| HOST_SNI_RULE.captures(tag))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// URL of a service from its routing tags; first tag with a host rule wins.
pub fn service_url(tags: &[String]) -> Option<String> {
    tags.iter()
        .find_map(|t| host_from_tag(t))
        .map(|host| format!("http://{host}"))
}

pub fn canonical_label(label: &str) -> &str {
    LABEL_RENAMES
        .iter()
        .find(|(old, _)| *old == label)
        .map_or(label, |(_, new)| *new)
}

/// Builds the label -> URL map of a deployment. `node_domain` is known only once an
/// allocation has been placed; until then templated URLs are kept as declared.
pub fn derive_endpoints(
    services: &[RawService],
    node_domain: Option<&str>,
) -> BTreeMap<String, String> {
    let mut endpoints = BTreeMap::new();
    for service in services {
        let label = canonical_label(&service.port_label).to_string();
        let tags = service.tags.as_deref().unwrap_or(&[]);
        let url = match service_url(tags) {
            Some(url) => resolve_domain(url, node_domain),
            None => MISSING_ENDPOINT.to_string(),
        };
        endpoints.insert(label, url);
    }
    if let Some(api) = endpoints.get_mut("api")
        && api.as_str() != MISSING_ENDPOINT
    {
        api.push_str(API_UI_PATH);
    }
    endpoints
}

fn resolve_domain(url: String, node_domain: Option<&str>) -> String {
    match node_domain {
        Some(domain) if url.contains(DOMAIN_PLACEHOLDER) => url.replace(DOMAIN_PLACEHOLDER, domain),
        _ => url,
    }
}

/// Service started by the launcher, e.g. `deep-start --jupyter` -> "jupyter".
pub fn launcher_service(command: &str) -> Option<&str> {
    LAUNCHER
        .captures(command)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Endpoint label the launcher service is reached through.
pub fn service_endpoint_label(service: &str) -> Option<&'static str> {
    SERVICE_ENDPOINTS
        .iter()
        .find(|(s, _)| *s == service)
        .map(|(_, label)| *label)
}

/// Label of the main endpoint: the launcher's service when it maps to an existing endpoint,
/// else the first endpoint, else none.
pub fn main_endpoint(command: Option<&str>, endpoints: &BTreeMap<String, String>) -> Option<String> {
    let launched = command
        .and_then(launcher_service)
        .and_then(service_endpoint_label)
        .filter(|label| endpoints.contains_key(*label));
    match launched {
        Some(label) => Some(label.to_string()),
        None => endpoints.keys().next().cloned(),
    }
}
