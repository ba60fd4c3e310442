//! Ordered resolver collection.
//!
//! The [`ResolverRegistry`] keeps resolvers in registration order and hands
//! them out filtered and ordered by [`SourceKind`]. [`ResolverRegistry::resolve_first`]
//! is the lookup-only loop: the first resolver that locates resources wins.

use tracing::{debug, info, warn};

use crate::parser::Pmid;

use super::{ResolveContext, ResolveError, ResolveStep, ResolvedResource, Resolver, SourceKind};

/// An ordered collection of resolvers.
pub struct ResolverRegistry {
    resolvers: Vec<Box<dyn Resolver>>,
}

impl ResolverRegistry {
    /// Creates an empty resolver registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            resolvers: Vec::new(),
        }
    }

    /// Registers a resolver. A later resolver for the same source replaces the earlier one.
    #[tracing::instrument(skip(self, resolver), fields(resolver_name))]
    pub fn register(&mut self, resolver: Box<dyn Resolver>) {
        tracing::Span::current().record("resolver_name", resolver.name());
        debug!(name = resolver.name(), source = %resolver.source(), "Registering resolver");
        if let Some(slot) = self
            .resolvers
            .iter_mut()
            .find(|existing| existing.source() == resolver.source())
        {
            *slot = resolver;
        } else {
            self.resolvers.push(resolver);
        }
    }

    /// Returns the number of registered resolvers.
    #[must_use]
    pub fn resolver_count(&self) -> usize {
        self.resolvers.len()
    }

    /// Returns true if no resolvers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Iterates resolvers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Resolver> {
        self.resolvers.iter().map(AsRef::as_ref)
    }

    /// Returns the resolver for `source`, if registered.
    #[must_use]
    pub fn get(&self, source: SourceKind) -> Option<&dyn Resolver> {
        self.iter().find(|r| r.source() == source)
    }

    /// Returns the registered resolvers for `sources`, in the order given.
    ///
    /// Unregistered sources are skipped; repeated sources appear once.
    #[must_use]
    pub fn select(&self, sources: &[SourceKind]) -> Vec<&dyn Resolver> {
        let mut selected: Vec<&dyn Resolver> = Vec::with_capacity(sources.len());
        for source in sources {
            if selected.iter().any(|r| r.source() == *source) {
                continue;
            }
            if let Some(resolver) = self.get(*source) {
                selected.push(resolver);
            }
        }
        selected
    }

    /// Asks each selected resolver in turn and returns the first set of resources.
    ///
    /// Does not download anything; the grabber runs its own loop so that a
    /// source whose resources all fail to download falls through to the next.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NoResolver`] if none of `sources` is registered,
    /// or [`ResolveError::AllResolversFailed`] if every selected resolver fails.
    #[tracing::instrument(skip(self, ctx), fields(pmid = %pmid))]
    pub async fn resolve_first(
        &self,
        pmid: &Pmid,
        sources: &[SourceKind],
        ctx: &ResolveContext,
    ) -> Result<(SourceKind, Vec<ResolvedResource>), ResolveError> {
        let handlers = self.select(sources);
        if handlers.is_empty() {
            return Err(ResolveError::no_resolver(pmid.as_str()));
        }

        for handler in &handlers {
            debug!(resolver = handler.name(), "Trying resolver");
            match handler.resolve(pmid, ctx).await {
                Ok(ResolveStep::Resources(resources)) if !resources.is_empty() => {
                    info!(
                        resolver = handler.name(),
                        count = resources.len(),
                        "Resolution successful"
                    );
                    return Ok((handler.source(), resources));
                }
                Ok(ResolveStep::Resources(_)) => {
                    debug!(resolver = handler.name(), "Resolver returned no resources");
                }
                Ok(ResolveStep::Failed(err)) => {
                    debug!(resolver = handler.name(), error = %err, "Resolver failed, trying next");
                }
                Err(err) => {
                    warn!(resolver = handler.name(), error = %err, "Resolver returned error");
                }
            }
        }

        Err(ResolveError::all_failed(pmid.as_str(), handlers.len()))
    }
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.resolvers.iter().map(|r| r.name()).collect();
        f.debug_struct("ResolverRegistry")
            .field("resolver_count", &self.resolvers.len())
            .field("resolvers", &names)
            .finish()
    }
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::download::ArticleFormat;
    use async_trait::async_trait;

    struct Fixed {
        source: SourceKind,
        url: Option<&'static str>,
    }

    #[async_trait]
    impl Resolver for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn source(&self) -> SourceKind {
            self.source
        }

        async fn resolve(
            &self,
            pmid: &Pmid,
            _ctx: &ResolveContext,
        ) -> Result<ResolveStep, ResolveError> {
            Ok(match self.url {
                Some(url) => {
                    ResolveStep::Resources(vec![ResolvedResource::new(url, ArticleFormat::Pdf)])
                }
                None => ResolveStep::Failed(ResolveError::resolution_failed(
                    pmid.as_str(),
                    "nothing here",
                )),
            })
        }
    }

    fn pmid() -> Pmid {
        Pmid::parse("1").unwrap()
    }

    #[test]
    fn test_registry_select_follows_requested_order() {
        let mut registry = ResolverRegistry::new();
        registry.register(Box::new(Fixed {
            source: SourceKind::Crossref,
            url: None,
        }));
        registry.register(Box::new(Fixed {
            source: SourceKind::PmcOa,
            url: None,
        }));

        let order: Vec<SourceKind> = registry
            .select(&[SourceKind::PmcOa, SourceKind::Crossref, SourceKind::PmcOa])
            .iter()
            .map(|r| r.source())
            .collect();
        assert_eq!(order, vec![SourceKind::PmcOa, SourceKind::Crossref]);
    }

    #[test]
    fn test_registry_register_replaces_same_source() {
        let mut registry = ResolverRegistry::new();
        registry.register(Box::new(Fixed {
            source: SourceKind::Crossref,
            url: None,
        }));
        registry.register(Box::new(Fixed {
            source: SourceKind::Crossref,
            url: Some("https://x/a.pdf"),
        }));
        assert_eq!(registry.resolver_count(), 1);
    }

    #[tokio::test]
    async fn test_resolve_first_falls_through_failed_source() {
        let mut registry = ResolverRegistry::new();
        registry.register(Box::new(Fixed {
            source: SourceKind::Crossref,
            url: None,
        }));
        registry.register(Box::new(Fixed {
            source: SourceKind::PmcOa,
            url: Some("https://x/a.pdf"),
        }));

        let (source, resources) = registry
            .resolve_first(&pmid(), &SourceKind::DEFAULT_ORDER, &ResolveContext::default())
            .await
            .unwrap();
        assert_eq!(source, SourceKind::PmcOa);
        assert_eq!(resources[0].url, "https://x/a.pdf");
    }

    #[tokio::test]
    async fn test_resolve_first_all_failed() {
        let mut registry = ResolverRegistry::new();
        registry.register(Box::new(Fixed {
            source: SourceKind::Crossref,
            url: None,
        }));
        let err = registry
            .resolve_first(&pmid(), &[SourceKind::Crossref], &ResolveContext::default())
            .await
            .unwrap_err();
        assert!(
            matches!(err, ResolveError::AllResolversFailed { tried_count: 1, .. }),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_resolve_first_without_matching_resolver() {
        let registry = ResolverRegistry::new();
        let err = registry
            .resolve_first(&pmid(), &[SourceKind::PmcOa], &ResolveContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NoResolver { .. }), "got {err:?}");
    }
}
