//! The configured set of clusters

use std::sync::Arc;

use crate::ClusterClient;
use crate::api::ClusterApi;
use crate::error::Result;

/// Ordered set of cluster clients
#[derive(Clone, Default)]
pub struct Clusters {
    clients: Vec<Arc<dyn ClusterApi>>,
}

impl Clusters {
    pub fn new(clients: Vec<Arc<dyn ClusterApi>>) -> Self {
        Self { clients }
    }

    /// Build one [`ClusterClient`] per configured URL
    pub fn from_urls<S: AsRef<str>>(urls: &[S]) -> Result<Self> {
        let clients = urls
            .iter()
            .map(|url| ClusterClient::new(url.as_ref()).map(|c| Arc::new(c) as Arc<dyn ClusterApi>))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { clients })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ClusterApi>> {
        self.clients.iter()
    }

    /// The cluster whose canonical URL is exactly `url`
    pub fn find(&self, url: &str) -> Option<Arc<dyn ClusterApi>> {
        self.clients.iter().find(|client| client.url() == url).cloned()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl std::fmt::Debug for Clusters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.clients.iter().map(|client| client.url()))
            .finish()
    }
}
