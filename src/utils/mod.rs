//! Utility functions and helpers.

pub mod http;

use url::Url;

/// Parse a base URL so that relative joins append to its path.
pub fn base_url(raw: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(raw.trim())?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Build the query URL for one partition of the source.
pub fn partition_url(endpoint: &Url, year: i32) -> Url {
    let mut url = endpoint.clone();
    url.query_pairs_mut()
        .append_pair("ajax", "true")
        .append_pair("year", &year.to_string());
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_adds_trailing_slash() {
        let base = base_url("http://localhost:4444/wd/hub").unwrap();
        assert_eq!(base.as_str(), "http://localhost:4444/wd/hub/");
        assert_eq!(
            base.join("session").unwrap().as_str(),
            "http://localhost:4444/wd/hub/session"
        );

        let root = base_url("http://localhost:9515").unwrap();
        assert_eq!(root.join("session").unwrap().as_str(), "http://localhost:9515/session");
    }

    #[test]
    fn test_partition_url() {
        let endpoint = Url::parse("https://www.scrapethissite.com/pages/ajax-javascript/").unwrap();
        assert_eq!(
            partition_url(&endpoint, 2012).as_str(),
            "https://www.scrapethissite.com/pages/ajax-javascript/?ajax=true&year=2012"
        );
    }
}
