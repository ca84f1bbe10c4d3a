//! Checks a pipeline against the service before it is added.
//!
//! Nothing is modified here; the caller applies the pipeline once it passes.

use super::pipeline::{find_service_end, PipeEnd, Pipeline, PipelineError};
use crate::topology::service::Service;

/// Validates `pipeline` against the already accepted `pipelines`.
///
/// - the head has at least one proxy and is valid
/// - every proxy url is one of `proxy_urls`
/// - a handler end names a category of `service`
/// - at most one pipeline ends at the service itself
pub fn prepare_adding_pipeline(
    pipelines: &[Pipeline],
    proxy_urls: &[String],
    service: &Service,
    pipeline: &Pipeline,
) -> Result<(), PipelineError> {
    if !pipeline.has_length() {
        return Err(PipelineError::NoProxy);
    }
    pipeline.validate_head()?;

    if let Some(proxy) = pipeline
        .head
        .iter()
        .find(|proxy| !proxy_urls.contains(&proxy.url))
    {
        return Err(PipelineError::UnknownProxy(proxy.url.clone()));
    }

    match &pipeline.end {
        PipeEnd::Handler { category } => {
            if !service.has_category(category) {
                return Err(PipelineError::MissingHandler(category.clone()));
            }
        }
        PipeEnd::Service => {
            if find_service_end(pipelines).is_some() {
                return Err(PipelineError::ServicePipelineExists);
            }
        }
    }

    Ok(())
}
