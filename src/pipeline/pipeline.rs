//! Pipelines: the proxies in front of one end of a service.

use thiserror::Error;

use crate::topology::chain::ProxyChain;
use crate::topology::proxy::Proxy;
use crate::topology::rule::Rule;

/// Errors raised while registering a pipeline.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("no proxy")]
    NoProxy,

    #[error("invalid head: proxy #{0} is invalid")]
    InvalidProxy(usize),

    #[error("invalid head: proxy '{0}' appears twice")]
    DuplicateProxy(String),

    #[error("proxy '{0}' url not required")]
    UnknownProxy(String),

    #[error("handler category '{0}' does not exist in the service")]
    MissingHandler(String),

    #[error("service pipeline added already")]
    ServicePipelineExists,
}

/// What the last proxy of a pipeline talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipeEnd {
    /// The service as a whole, through its proxy entry point.
    Service,
    /// Handlers of one category of the service.
    Handler { category: String },
}

impl PipeEnd {
    pub fn handler(category: impl Into<String>) -> Self {
        PipeEnd::Handler {
            category: category.into(),
        }
    }

    pub fn is_handler(&self) -> bool {
        matches!(self, PipeEnd::Handler { .. })
    }

    pub fn pipeline(self, head: Vec<Proxy>) -> Pipeline {
        Pipeline { end: self, head }
    }
}

/// Proxies in call order, ending at `end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub end: PipeEnd,
    pub head: Vec<Proxy>,
}

impl Pipeline {
    pub fn has_length(&self) -> bool {
        !self.head.is_empty()
    }

    /// Every proxy valid and listed once.
    pub fn validate_head(&self) -> Result<(), PipelineError> {
        for (i, proxy) in self.head.iter().enumerate() {
            if !proxy.is_valid() {
                return Err(PipelineError::InvalidProxy(i));
            }
            if self.head[i + 1..]
                .iter()
                .any(|other| other.id == proxy.id || other.url == proxy.url)
            {
                return Err(PipelineError::DuplicateProxy(proxy.url.clone()));
            }
        }
        Ok(())
    }

    /// The proxy that talks to the end.
    pub fn head_last(&self) -> Option<&Proxy> {
        self.head.last()
    }

    /// Every proxy before the last one.
    pub fn head_front(&self) -> &[Proxy] {
        match self.head.split_last() {
            Some((_, front)) => front,
            None => &[],
        }
    }

    /// The proxy callers reach first.
    pub fn beginning(&self) -> Option<&Proxy> {
        self.head.first()
    }

    pub fn is_multi_head(&self) -> bool {
        self.head.len() > 1
    }

    /// The rule a caller of this pipeline reaches on `service_url`.
    pub fn rule(&self, service_url: &str) -> Rule {
        match &self.end {
            PipeEnd::Service => Rule::service([service_url]),
            PipeEnd::Handler { category } => Rule::handler([service_url], [category.as_str()]),
        }
    }
}

pub fn find_handler_ends(pipelines: &[Pipeline]) -> Vec<&Pipeline> {
    pipelines
        .iter()
        .filter(|pipeline| pipeline.end.is_handler())
        .collect()
}

pub fn find_service_end(pipelines: &[Pipeline]) -> Option<&Pipeline> {
    pipelines.iter().find(|pipeline| !pipeline.end.is_handler())
}

/// Pipelines of the service at `service_url`, derived from the chains whose
/// destination lists it.
///
/// A service-shaped chain gives one service end; handler and route chains
/// give one handler end per category. Only the first service end is kept and
/// equal pipelines are listed once.
pub fn service_pipelines(chains: &[ProxyChain], service_url: &str) -> Vec<Pipeline> {
    let mut pipelines: Vec<Pipeline> = Vec::new();
    let mut push = |pipeline: Pipeline| {
        if !pipelines.contains(&pipeline) {
            pipelines.push(pipeline);
        }
    };

    let mut has_service_end = false;
    for chain in chains {
        if !chain.destination.urls().iter().any(|url| url == service_url) {
            continue;
        }

        if chain.destination.is_service() {
            if !has_service_end {
                has_service_end = true;
                push(PipeEnd::Service.pipeline(chain.proxies.clone()));
            }
            continue;
        }

        for category in chain.destination.categories() {
            push(PipeEnd::handler(category.clone()).pipeline(chain.proxies.clone()));
        }
    }

    pipelines
}
