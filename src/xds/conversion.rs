//! Rendering of compiled clusters and route tables as envoy-types v3 messages
//!
//! The compiler works on its own descriptor types. These helpers translate them into
//! the protobuf structures served over discovery so callers can encode them with
//! `prost` and wrap them in `Any`.

use super::cluster::{Cluster, ClusterType, LbType, SslContext};
use super::route::{HttpRoute, HttpRouteConfig};
use crate::errors::{Error, Result};
use envoy_types::pb::envoy::config::cluster::v3::cluster::{
    ClusterDiscoveryType, DiscoveryType, EdsClusterConfig, LbPolicy,
};
use envoy_types::pb::envoy::config::cluster::v3::Cluster as EnvoyCluster;
use envoy_types::pb::envoy::config::core::v3::transport_socket::ConfigType as TransportSocketConfigType;
use envoy_types::pb::envoy::config::core::v3::{
    address, config_source::ConfigSourceSpecifier, data_source, socket_address, Address,
    AggregatedConfigSource, ConfigSource, DataSource, HeaderValue, HeaderValueOption,
    Http2ProtocolOptions, SocketAddress, TransportSocket,
};
use envoy_types::pb::envoy::config::endpoint::v3::{
    lb_endpoint, ClusterLoadAssignment, Endpoint, LbEndpoint, LocalityLbEndpoints,
};
use envoy_types::pb::envoy::config::route::v3::{
    header_matcher::HeaderMatchSpecifier, redirect_action::PathRewriteSpecifier, route::Action,
    route_action::{ClusterSpecifier, HostRewriteSpecifier, UpgradeConfig},
    route_match::PathSpecifier, weighted_cluster::ClusterWeight, Decorator,
    HeaderMatcher as EnvoyHeaderMatcher, RedirectAction, RetryPolicy as EnvoyRetryPolicy, Route,
    RouteAction, RouteConfiguration, RouteMatch, VirtualHost as EnvoyVirtualHost,
    WeightedCluster as EnvoyWeightedCluster,
};
use envoy_types::pb::envoy::extensions::transport_sockets::tls::v3::{
    common_tls_context, subject_alt_name_matcher::SanType, CertificateValidationContext,
    CommonTlsContext, SubjectAltNameMatcher, TlsCertificate, UpstreamTlsContext,
};
use envoy_types::pb::envoy::extensions::upstreams::http::v3::http_protocol_options::explicit_http_config::ProtocolConfig;
use envoy_types::pb::envoy::extensions::upstreams::http::v3::{
    http_protocol_options::{ExplicitHttpConfig, UpstreamProtocolOptions},
    HttpProtocolOptions as UpstreamHttpProtocolOptions,
};
use envoy_types::pb::envoy::r#type::matcher::v3::{string_matcher::MatchPattern, RegexMatcher, StringMatcher};
use envoy_types::pb::google::protobuf::{Any, BoolValue, Duration, UInt32Value};
use prost::Message;
use std::collections::HashMap;

pub const CLUSTER_TYPE_URL: &str = "type.googleapis.com/envoy.config.cluster.v3.Cluster";
pub const ROUTE_TYPE_URL: &str = "type.googleapis.com/envoy.config.route.v3.RouteConfiguration";
pub const HTTP_PROTOCOL_OPTIONS_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.upstreams.http.v3.HttpProtocolOptions";
pub const UPSTREAM_TLS_CONTEXT_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.UpstreamTlsContext";

const HTTP_PROTOCOL_OPTIONS_KEY: &str = "envoy.extensions.upstreams.http.v3.HttpProtocolOptions";
const TLS_TRANSPORT_SOCKET: &str = "envoy.transport_sockets.tls";

fn millis_to_duration(ms: u64) -> Duration {
    Duration { seconds: (ms / 1000) as i64, nanos: ((ms % 1000) * 1_000_000) as i32 }
}

/// Split a `tcp://host:port` url into its parts
fn parse_host_url(url: &str) -> Result<(String, u32)> {
    let rest = url
        .strip_prefix("tcp://")
        .ok_or_else(|| Error::validation(format!("Host url '{}' must start with tcp://", url)))?;
    let (host, port) = rest
        .rsplit_once(':')
        .ok_or_else(|| Error::validation(format!("Host url '{}' has no port", url)))?;
    let port = port
        .parse::<u32>()
        .map_err(|_| Error::validation(format!("Host url '{}' has an invalid port", url)))?;
    Ok((host.to_string(), port))
}

fn endpoint_address(host: String, port: u32) -> Address {
    Address {
        address: Some(address::Address::SocketAddress(SocketAddress {
            address: host,
            port_specifier: Some(socket_address::PortSpecifier::PortValue(port)),
            ..Default::default()
        })),
    }
}

fn data_source_from_path(path: &str) -> DataSource {
    DataSource { specifier: Some(data_source::Specifier::Filename(path.to_string())), ..Default::default() }
}

fn upstream_tls_transport_socket(ssl: &SslContext) -> TransportSocket {
    let mut common = CommonTlsContext::default();

    if let (Some(chain), Some(key)) = (&ssl.cert_chain_file, &ssl.private_key_file) {
        common.tls_certificates.push(TlsCertificate {
            certificate_chain: Some(data_source_from_path(chain)),
            private_key: Some(data_source_from_path(key)),
            ..Default::default()
        });
    }

    if let Some(ca) = &ssl.ca_cert_file {
        let match_typed_subject_alt_names = ssl
            .verify_subject_alt_name
            .iter()
            .map(|san| SubjectAltNameMatcher {
                san_type: SanType::Uri as i32,
                matcher: Some(StringMatcher {
                    match_pattern: Some(MatchPattern::Exact(san.clone())),
                    ignore_case: false,
                }),
                ..Default::default()
            })
            .collect();

        common.validation_context_type =
            Some(common_tls_context::ValidationContextType::ValidationContext(CertificateValidationContext {
                trusted_ca: Some(data_source_from_path(ca)),
                match_typed_subject_alt_names,
                ..Default::default()
            }));
    }

    let tls_context = UpstreamTlsContext { common_tls_context: Some(common), ..Default::default() };

    TransportSocket {
        name: TLS_TRANSPORT_SOCKET.to_string(),
        config_type: Some(TransportSocketConfigType::TypedConfig(Any {
            type_url: UPSTREAM_TLS_CONTEXT_TYPE_URL.to_string(),
            value: tls_context.encode_to_vec(),
        })),
    }
}

fn http2_protocol_options() -> HashMap<String, Any> {
    let options = UpstreamHttpProtocolOptions {
        upstream_protocol_options: Some(UpstreamProtocolOptions::ExplicitHttpConfig(ExplicitHttpConfig {
            protocol_config: Some(ProtocolConfig::Http2ProtocolOptions(Http2ProtocolOptions::default())),
        })),
        ..Default::default()
    };

    let mut map = HashMap::new();
    map.insert(
        HTTP_PROTOCOL_OPTIONS_KEY.to_string(),
        Any { type_url: HTTP_PROTOCOL_OPTIONS_TYPE_URL.to_string(), value: options.encode_to_vec() },
    );
    map
}

/// Translate a compiled cluster into a v3 `Cluster`
pub fn to_envoy_cluster(cluster: &Cluster) -> Result<EnvoyCluster> {
    let discovery_type = match cluster.cluster_type {
        ClusterType::Sds => DiscoveryType::Eds,
        ClusterType::StrictDns => DiscoveryType::StrictDns,
        ClusterType::Static => DiscoveryType::Static,
        ClusterType::OriginalDst => DiscoveryType::OriginalDst,
    };
    let lb_policy = match cluster.lb_type {
        LbType::RoundRobin => LbPolicy::RoundRobin,
        LbType::OriginalDstLb => LbPolicy::ClusterProvided,
    };

    let mut envoy = EnvoyCluster {
        name: cluster.name.clone(),
        connect_timeout: Some(millis_to_duration(cluster.connect_timeout_ms)),
        cluster_discovery_type: Some(ClusterDiscoveryType::Type(discovery_type as i32)),
        lb_policy: lb_policy as i32,
        ..Default::default()
    };

    if cluster.cluster_type == ClusterType::Sds {
        envoy.eds_cluster_config = Some(EdsClusterConfig {
            service_name: cluster.service_name.clone(),
            eds_config: Some(ConfigSource {
                config_source_specifier: Some(ConfigSourceSpecifier::Ads(AggregatedConfigSource::default())),
                ..Default::default()
            }),
            ..Default::default()
        });
    }

    if !cluster.hosts.is_empty() {
        let lb_endpoints = cluster
            .hosts
            .iter()
            .map(|host| {
                let (address, port) = parse_host_url(&host.url)?;
                Ok(LbEndpoint {
                    host_identifier: Some(lb_endpoint::HostIdentifier::Endpoint(Endpoint {
                        address: Some(endpoint_address(address, port)),
                        ..Default::default()
                    })),
                    ..Default::default()
                })
            })
            .collect::<Result<Vec<_>>>()?;

        envoy.load_assignment = Some(ClusterLoadAssignment {
            cluster_name: cluster.name.clone(),
            endpoints: vec![LocalityLbEndpoints { lb_endpoints, ..Default::default() }],
            ..Default::default()
        });
    }

    if cluster.is_http2() {
        envoy.typed_extension_protocol_options = http2_protocol_options();
    }

    if let Some(ssl) = &cluster.ssl_context {
        envoy.transport_socket = Some(upstream_tls_transport_socket(ssl));
    }

    Ok(envoy)
}

fn to_envoy_header_matcher(header: &super::route::HeaderMatcher) -> EnvoyHeaderMatcher {
    let pattern = if header.regex {
        MatchPattern::SafeRegex(RegexMatcher { regex: header.value.clone(), ..Default::default() })
    } else {
        MatchPattern::Exact(header.value.clone())
    };

    EnvoyHeaderMatcher {
        name: header.name.clone(),
        header_match_specifier: Some(HeaderMatchSpecifier::StringMatch(StringMatcher {
            match_pattern: Some(pattern),
            ignore_case: false,
        })),
        ..Default::default()
    }
}

fn to_envoy_route_match(route: &HttpRoute) -> RouteMatch {
    let path_specifier = if let Some(path) = &route.path {
        PathSpecifier::Path(path.clone())
    } else if let Some(regex) = &route.regex {
        PathSpecifier::SafeRegex(RegexMatcher { regex: regex.clone(), ..Default::default() })
    } else {
        PathSpecifier::Prefix(route.prefix.clone().unwrap_or_else(|| "/".to_string()))
    };

    RouteMatch {
        path_specifier: Some(path_specifier),
        headers: route.headers.iter().map(to_envoy_header_matcher).collect(),
        ..Default::default()
    }
}

fn to_envoy_action(route: &HttpRoute) -> Result<Action> {
    if route.is_redirect() {
        return Ok(Action::Redirect(RedirectAction {
            host_redirect: route.host_redirect.clone().unwrap_or_default(),
            path_rewrite_specifier: route.path_redirect.clone().map(PathRewriteSpecifier::PathRedirect),
            ..Default::default()
        }));
    }

    let cluster_specifier = match (&route.cluster, &route.weighted_clusters) {
        (Some(name), _) => ClusterSpecifier::Cluster(name.clone()),
        (None, Some(weighted)) => {
            #[allow(deprecated)]
            let weighted = EnvoyWeightedCluster {
                clusters: weighted
                    .clusters
                    .iter()
                    .map(|entry| ClusterWeight {
                        name: entry.name.clone(),
                        weight: Some(UInt32Value { value: entry.weight }),
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            };
            ClusterSpecifier::WeightedClusters(weighted)
        }
        (None, None) => {
            return Err(Error::validation("Route has neither a cluster nor weighted clusters"));
        }
    };

    #[allow(deprecated)]
    let mut action = RouteAction {
        cluster_specifier: Some(cluster_specifier),
        timeout: route.timeout_ms.map(millis_to_duration),
        ..Default::default()
    };

    if let Some(prefix) = &route.prefix_rewrite {
        action.prefix_rewrite = prefix.clone();
    }
    if let Some(host) = &route.host_rewrite {
        action.host_rewrite_specifier = Some(HostRewriteSpecifier::HostRewriteLiteral(host.clone()));
    }
    if let Some(retry) = &route.retry_policy {
        action.retry_policy = Some(EnvoyRetryPolicy {
            retry_on: retry.retry_on.clone(),
            num_retries: Some(UInt32Value { value: retry.num_retries }),
            per_try_timeout: retry.per_try_timeout_ms.map(millis_to_duration),
            ..Default::default()
        });
    }
    if route.use_websocket {
        action.upgrade_configs.push(UpgradeConfig { upgrade_type: "websocket".to_string(), ..Default::default() });
    }

    Ok(Action::Route(action))
}

fn to_envoy_route(route: &HttpRoute) -> Result<Route> {
    #[allow(deprecated)]
    let request_headers_to_add = route
        .request_headers_to_add
        .iter()
        .map(|header| HeaderValueOption {
            header: Some(HeaderValue { key: header.key.clone(), value: header.value.clone(), ..Default::default() }),
            ..Default::default()
        })
        .collect();

    Ok(Route {
        r#match: Some(to_envoy_route_match(route)),
        action: Some(to_envoy_action(route)?),
        decorator: route
            .decorator
            .as_ref()
            .map(|d| Decorator { operation: d.operation.clone(), ..Default::default() }),
        request_headers_to_add,
        ..Default::default()
    })
}

/// Translate a compiled route table into a v3 `RouteConfiguration` named `name`
pub fn to_envoy_route_configuration(name: &str, config: &HttpRouteConfig) -> Result<RouteConfiguration> {
    let virtual_hosts = config
        .virtual_hosts
        .iter()
        .map(|host| {
            Ok(EnvoyVirtualHost {
                name: host.name.clone(),
                domains: host.domains.clone(),
                routes: host.routes.iter().map(to_envoy_route).collect::<Result<Vec<_>>>()?,
                ..Default::default()
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RouteConfiguration {
        name: name.to_string(),
        virtual_hosts,
        validate_clusters: Some(BoolValue { value: config.validate_clusters }),
        ..Default::default()
    })
}

/// Encode a cluster as an `Any` resource
pub fn cluster_to_any(cluster: &Cluster) -> Result<Any> {
    let envoy = to_envoy_cluster(cluster)?;
    Ok(Any { type_url: CLUSTER_TYPE_URL.to_string(), value: envoy.encode_to_vec() })
}

/// Encode a route table as an `Any` resource
pub fn route_configuration_to_any(name: &str, config: &HttpRouteConfig) -> Result<Any> {
    let envoy = to_envoy_route_configuration(name, config)?;
    Ok(Any { type_url: ROUTE_TYPE_URL.to_string(), value: envoy.encode_to_vec() })
}
