use crate::errors::LoadError;
use crate::net::{fetch, Response};
use crate::subsystem::{HeavyVisual, LoadFuture, ParticleField, SceneDescriptor, SubsystemLoader, VisualProps};
use futures::FutureExt;
use std::sync::Arc;
use url::Url;

/// Fetches the scene descriptor from `url` and instantiates a [`ParticleField`] from it.
#[derive(Debug, Clone)]
pub struct HttpSceneLoader {
    client: reqwest::Client,
    url: Url,
}

impl HttpSceneLoader {
    pub fn new(url: Url) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl SubsystemLoader for HttpSceneLoader {
    fn load(&self, props: VisualProps) -> LoadFuture {
        let client = self.client.clone();
        let url = self.url.clone();
        async move {
            let response = fetch(&client, url).await?;
            let field = decode_scene(&response, props)?;
            Ok(Arc::new(field) as Arc<dyn HeavyVisual>)
        }
        .boxed()
    }
}

pub fn decode_scene(response: &Response, props: VisualProps) -> Result<ParticleField, LoadError> {
    if !response.is_success() {
        log::warn!("scene request to {} returned {}", response.url, response.status);
        return Err(LoadError::Status(response.status));
    }

    let descriptor: SceneDescriptor = serde_json::from_slice(&response.body)?;
    ParticleField::instantiate(props, descriptor)
}
