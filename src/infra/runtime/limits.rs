use crate::infra::config::UpstreamConfig;

/// Build the upstream reqwest client: configured timeouts, no redirects
/// (a redirect from the API is a login page, never a result), and the
/// configured `accept-language`.
pub fn make_http_client(cfg: &UpstreamConfig) -> Result<reqwest::Client, reqwest::Error> {
    let mut headers = reqwest::header::HeaderMap::new();
    if let Ok(lang) = reqwest::header::HeaderValue::from_str(&cfg.language) {
        headers.insert(reqwest::header::ACCEPT_LANGUAGE, lang);
    }
    reqwest::Client::builder()
        .connect_timeout(cfg.connect_timeout)
        .timeout(cfg.timeout)
        .redirect(reqwest::redirect::Policy::none())
        .default_headers(headers)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_defaults() {
        assert!(make_http_client(&UpstreamConfig::default()).is_ok());
    }

    #[test]
    fn tolerates_unusable_language_header() {
        let cfg = UpstreamConfig {
            language: "en\nUS".into(),
            ..UpstreamConfig::default()
        };
        assert!(make_http_client(&cfg).is_ok());
    }
}
