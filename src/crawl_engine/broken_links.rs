//! Optional in-crawl broken-link sampler, off by default.
//!
//! Grounded on `geo_extractors.py`'s `BrokenLinkExtractor`, which the
//! original pipeline excludes by default because it makes extra outbound
//! HTTP requests. Kept opt-in here for the same reason.

const MAX_SAMPLE: usize = 10;

/// HEAD-checks (falling back to GET on 405) up to `MAX_SAMPLE` of the given
/// links and returns the ones that came back broken.
pub async fn sample_broken(http: &reqwest::Client, links: &[crate::page_extractor::schema::CrawlLink]) -> Vec<String> {
    let mut broken = Vec::new();
    for link in links.iter().take(MAX_SAMPLE) {
        if is_broken(http, &link.url).await {
            broken.push(link.url.clone());
        }
    }
    broken
}

async fn is_broken(http: &reqwest::Client, url: &str) -> bool {
    match http.head(url).send().await {
        Ok(resp) if resp.status().as_u16() == 405 => match http.get(url).send().await {
            Ok(resp) => resp.status().is_client_error() || resp.status().is_server_error(),
            Err(_) => true,
        },
        Ok(resp) => resp.status().is_client_error() || resp.status().is_server_error(),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_extractor::schema::CrawlLink;

    fn link(url: &str) -> CrawlLink {
        CrawlLink { url: url.to_string(), text: String::new(), title: String::new(), rel: String::new(), is_external: false, path: String::new() }
    }

    #[tokio::test]
    async fn healthy_link_is_not_sampled_as_broken() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("HEAD", "/ok").with_status(200).create_async().await;
        let links = vec![link(&format!("{}/ok", server.url()))];

        let http = reqwest::Client::new();
        let broken = sample_broken(&http, &links).await;

        mock.assert_async().await;
        assert!(broken.is_empty());
    }

    #[tokio::test]
    async fn not_found_link_is_sampled_as_broken() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("HEAD", "/missing").with_status(404).create_async().await;
        let url = format!("{}/missing", server.url());
        let links = vec![link(&url)];

        let http = reqwest::Client::new();
        let broken = sample_broken(&http, &links).await;

        mock.assert_async().await;
        assert_eq!(broken, vec![url]);
    }

    #[tokio::test]
    async fn falls_back_to_get_when_head_is_not_allowed() {
        let mut server = mockito::Server::new_async().await;
        let head_mock = server.mock("HEAD", "/head-405").with_status(405).create_async().await;
        let get_mock = server.mock("GET", "/head-405").with_status(200).create_async().await;
        let links = vec![link(&format!("{}/head-405", server.url()))];

        let http = reqwest::Client::new();
        let broken = sample_broken(&http, &links).await;

        head_mock.assert_async().await;
        get_mock.assert_async().await;
        assert!(broken.is_empty());
    }
}
