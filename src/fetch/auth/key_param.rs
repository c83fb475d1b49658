use crate::fetch::HttpClient;
use async_trait::async_trait;
use reqwest::Url;

/// Query parameter the document store reads its web API key from.
const KEY_PARAM: &str = "key";

/// Appends the live store's API key (`?key=...`) to every request.
pub struct KeyParam<C> {
    inner: C,
    key: String,
}

impl<C> KeyParam<C> {
    pub fn new(inner: C, key: String) -> Self {
        Self { inner, key }
    }
}

/// Sets `key` on `url`, replacing any key already present.
fn with_key(url: &mut Url, key: &str) {
    let others: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| name != KEY_PARAM)
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    let mut query = url.query_pairs_mut();
    query.clear();
    query.extend_pairs(others);
    query.append_pair(KEY_PARAM, key);
}

#[async_trait]
impl<C: HttpClient> HttpClient for KeyParam<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        with_key(req.url_mut(), &self.key);
        self.inner.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_appended_after_paging() {
        let mut url = Url::parse("https://example.test/docs/1?pageSize=300").unwrap();
        with_key(&mut url, "abc");
        assert_eq!(url.as_str(), "https://example.test/docs/1?pageSize=300&key=abc");
    }

    #[test]
    fn test_existing_key_replaced() {
        let mut url = Url::parse("https://example.test/docs/1?key=old&pageToken=t").unwrap();
        with_key(&mut url, "new");
        assert_eq!(url.query(), Some("pageToken=t&key=new"));
    }
}
