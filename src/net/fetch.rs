use crate::net::Response;
use url::Url;

// Loads an URL and returns the buffered response. Non-2xx statuses are not errors here.
pub async fn fetch(client: &reqwest::Client, url: Url) -> Result<Response, reqwest::Error> {
    log::debug!("fetching {url}");
    let res = client.get(url).send().await?;

    let final_url = res.url().clone();
    let status = res.status().as_u16();

    // We don't do streaming
    let body = res.bytes().await?.to_vec();

    Ok(Response {
        url: final_url,
        status,
        body,
    })
}
