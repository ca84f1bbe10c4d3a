//! Proxy chains and the chain registry lookups.
//!
//! # Responsibilities
//! - Validate a chain: destination rule, proxies and allowed sources
//! - Find chains by rule or by destination url
//! - Collect the distinct last proxies of a set of chains
//!
//! # Design Decisions
//! - Chains are matched on rule equality, never on identity
//! - `sources` distinguishes "not set" (`None`, invalid) from "empty" (valid)

use serde::{Deserialize, Serialize};

use super::proxy::Proxy;
use super::rule::{is_equal_rule, Rule};

/// An ordered list of proxies placed in front of a destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyChain {
    /// Services allowed to use the chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,

    /// Proxies in call order. The last one talks to the destination.
    #[serde(default)]
    pub proxies: Vec<Proxy>,

    pub destination: Rule,
}

impl ProxyChain {
    pub fn new(sources: Vec<String>, proxies: Vec<Proxy>, destination: Rule) -> Self {
        Self {
            sources: Some(sources),
            proxies,
            destination,
        }
    }

    /// At least one proxy, each valid, no two sharing an id.
    pub fn is_proxies_valid(&self) -> bool {
        if self.proxies.is_empty() {
            return false;
        }

        for (i, proxy) in self.proxies.iter().enumerate() {
            if !proxy.is_valid() {
                return false;
            }
            if self.proxies[i + 1..].iter().any(|other| other.id == proxy.id) {
                return false;
            }
        }

        true
    }

    pub fn is_valid(&self) -> bool {
        self.destination.is_valid()
            && self.is_proxies_valid()
            && is_string_slice_valid(self.sources.as_deref())
    }

    /// Last proxy of the chain, the one that calls the destination.
    pub fn last_proxy(&self) -> Option<&Proxy> {
        self.proxies.last()
    }
}

/// `None` is invalid, an empty list is valid, otherwise no empty strings and
/// no duplicates.
pub fn is_string_slice_valid(list: Option<&[String]>) -> bool {
    let Some(list) = list else {
        return false;
    };

    for (i, item) in list.iter().enumerate() {
        if item.is_empty() {
            return false;
        }
        if list[i + 1..].contains(item) {
            return false;
        }
    }

    true
}

/// First chain whose destination equals `rule`. `None` for an invalid rule.
pub fn proxy_chain_by_rule<'a>(chains: &'a [ProxyChain], rule: &Rule) -> Option<&'a ProxyChain> {
    if !rule.is_valid() {
        return None;
    }

    chains
        .iter()
        .find(|chain| is_equal_rule(Some(&chain.destination), Some(rule)))
}

/// Index of the first chain whose destination equals `rule`.
pub fn proxy_chain_index(chains: &[ProxyChain], rule: &Rule) -> Option<usize> {
    chains
        .iter()
        .position(|chain| is_equal_rule(Some(&chain.destination), Some(rule)))
}

/// Every chain whose destination lists `url`. An empty url matches nothing.
pub fn proxy_chains_by_rule_url<'a>(chains: &'a [ProxyChain], url: &str) -> Vec<&'a ProxyChain> {
    if url.is_empty() {
        return Vec::new();
    }

    chains
        .iter()
        .filter(|chain| chain.destination.urls().iter().any(|u| u == url))
        .collect()
}

pub fn is_rule_exist(chains: &[ProxyChain], rule: Option<&Rule>) -> bool {
    let Some(rule) = rule else {
        return false;
    };

    proxy_chain_index(chains, rule).is_some()
}

/// Last proxy of every chain, deduplicated by id. First occurrence wins.
pub fn last_proxies(chains: &[ProxyChain]) -> Vec<&Proxy> {
    let mut proxies: Vec<&Proxy> = Vec::with_capacity(chains.len());

    for last in chains.iter().filter_map(ProxyChain::last_proxy) {
        if !proxies.iter().any(|proxy| proxy.id == last.id) {
            proxies.push(last);
        }
    }

    proxies
}

/// Proxies of the chain matching `rule`, or an empty slice.
pub fn chain<'a>(chains: &'a [ProxyChain], rule: &Rule) -> &'a [Proxy] {
    proxy_chain_index(chains, rule)
        .map(|i| chains[i].proxies.as_slice())
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proxy(id: &str) -> Proxy {
        Proxy::new(id, format!("{id}-url"), "proxy")
    }

    #[test]
    fn test_string_slice_validity() {
        assert!(!is_string_slice_valid(None));
        assert!(is_string_slice_valid(Some(&[])));
        assert!(is_string_slice_valid(Some(&["a".to_string(), "b".to_string()])));
        assert!(!is_string_slice_valid(Some(&["a".to_string(), String::new()])));
        assert!(!is_string_slice_valid(Some(&["a".to_string(), "a".to_string()])));
    }

    #[test]
    fn test_chain_sources_validity() {
        let mut chain = ProxyChain::new(
            Vec::new(),
            vec![proxy("auth")],
            Rule::handler(["svc-a"], ["cat1"]),
        );
        assert!(chain.is_valid());

        chain.sources = None;
        assert!(!chain.is_valid());

        chain.sources = Some(vec![String::new()]);
        assert!(!chain.is_valid());

        chain.sources = Some(vec!["web".to_string(), "web".to_string()]);
        assert!(!chain.is_valid());

        chain.sources = Some(vec!["web".to_string()]);
        assert!(chain.is_valid());
    }

    #[test]
    fn test_proxies_validity() {
        let rule = Rule::service(["svc"]);
        let chain = ProxyChain::new(Vec::new(), Vec::new(), rule.clone());
        assert!(!chain.is_proxies_valid());

        let chain = ProxyChain::new(Vec::new(), vec![Proxy::default()], rule.clone());
        assert!(!chain.is_proxies_valid());

        let duplicated = vec![
            Proxy::new("auth", "url-1", "cat-1"),
            Proxy::new("auth", "url-2", "cat-2"),
        ];
        let chain = ProxyChain::new(Vec::new(), duplicated, rule.clone());
        assert!(!chain.is_proxies_valid());
        assert!(!chain.is_valid());

        let chain = ProxyChain::new(Vec::new(), vec![proxy("a"), proxy("b")], rule);
        assert!(chain.is_proxies_valid());
    }

    #[test]
    fn test_invalid_destination() {
        let chain = ProxyChain::new(Vec::new(), vec![proxy("a")], Rule::default());
        assert!(!chain.is_valid());
    }

    #[test]
    fn test_last_proxies() {
        assert!(last_proxies(&[]).is_empty());

        let shared = vec![
            ProxyChain::new(Vec::new(), vec![proxy("a"), proxy("z")], Rule::service(["s1"])),
            ProxyChain::new(Vec::new(), vec![proxy("b"), proxy("z")], Rule::service(["s2"])),
        ];
        let last = last_proxies(&shared);
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].id, "z");

        let distinct = vec![
            ProxyChain::new(Vec::new(), vec![proxy("a")], Rule::service(["s1"])),
            ProxyChain::new(Vec::new(), Vec::new(), Rule::service(["s3"])),
            ProxyChain::new(Vec::new(), vec![proxy("b")], Rule::service(["s2"])),
        ];
        let last = last_proxies(&distinct);
        assert_eq!(last.len(), 2);
        assert_eq!(last[0].id, "a");
        assert_eq!(last[1].id, "b");
    }

    #[test]
    fn test_lookup_by_rule() {
        let chains = vec![
            ProxyChain::new(Vec::new(), vec![proxy("a")], Rule::service(["s1"])),
            ProxyChain::new(Vec::new(), vec![proxy("b")], Rule::handler(["s1"], ["db"])),
        ];

        let found = proxy_chain_by_rule(&chains, &Rule::handler(["s1"], ["db"])).unwrap();
        assert_eq!(found.proxies[0].id, "b");

        assert!(proxy_chain_by_rule(&chains, &Rule::service(["s2"])).is_none());
        assert!(proxy_chain_by_rule(&chains, &Rule::default()).is_none());

        assert!(is_rule_exist(&chains, Some(&Rule::service(["s1"]))));
        assert!(!is_rule_exist(&chains, Some(&Rule::service(["s2"]))));
        assert!(!is_rule_exist(&chains, None));

        assert_eq!(chain(&chains, &Rule::service(["s1"]))[0].id, "a");
        assert!(chain(&chains, &Rule::service(["nope"])).is_empty());
    }

    #[test]
    fn test_lookup_by_url() {
        let chains = vec![
            ProxyChain::new(Vec::new(), vec![proxy("a")], Rule::service(["s1", "s2"])),
            ProxyChain::new(Vec::new(), vec![proxy("b")], Rule::handler(["s2"], ["db"])),
        ];

        assert_eq!(proxy_chains_by_rule_url(&chains, "s1").len(), 1);
        assert_eq!(proxy_chains_by_rule_url(&chains, "s2").len(), 2);
        assert!(proxy_chains_by_rule_url(&chains, "s3").is_empty());
        assert!(proxy_chains_by_rule_url(&chains, "").is_empty());
    }

    #[test]
    fn test_yaml_shape() {
        let chain = ProxyChain::new(Vec::new(), vec![proxy("a")], Rule::service(["s1"]));
        let text = serde_yaml::to_string(&chain).unwrap();
        assert!(text.contains("sources: []"));
        assert!(text.contains("destination:"));

        let parsed: ProxyChain = serde_yaml::from_str(&text).unwrap();
        assert_eq!(parsed, chain);

        let unset: ProxyChain = serde_yaml::from_str(
            "proxies:\n- id: a\n  url: a-url\n  category: proxy\ndestination:\n  urls: [s1]\n",
        )
        .unwrap();
        assert!(unset.sources.is_none());
        assert!(!unset.is_valid());
    }
}
