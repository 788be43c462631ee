use log;
use regex;
use urlencoding;

/// Undoes percent-encoding and strips the stray backslashes that shells and
/// chat clients like to add when copying links.
pub fn clean_url(url : &str) -> String {
    let decoded = match urlencoding::decode(url.trim()) {
        Ok(decoded) => decoded.into_owned(),
        Err(err) => {
            log::warn!("failed to decode URL, using it as-is: {}", err);
            url.trim().to_owned()
        },
    };
    decoded.replace('\\', "")
}

#[derive(Debug)]
pub struct UrlMatcher {
    re_web : regex::Regex,
    re_playlist : Vec<regex::Regex>,
}

impl UrlMatcher {
    pub fn new() -> Self {
        Self {
            re_web : regex::Regex::new(r"(?i)^https?://[^\s/$.?#][^\s]*$").unwrap(),
            re_playlist : vec![
                regex::Regex::new(r"(?i)^(?:https?://)?(?:www\.|m\.)?youtube\.com/playlist\?list=[\w-]+").unwrap(),
                regex::Regex::new(r"(?i)^(?:https?://)?(?:www\.|m\.)?youtube\.com/watch\?.*list=[\w-]+").unwrap(),
            ],
        }
    }

    /// Anything that looks like an http(s) link; the extractor decides
    /// whether it actually knows the site.
    pub fn is_web_url(&self, url : &str) -> bool {
        self.re_web.is_match(url)
    }

    pub fn is_playlist_url(&self, url : &str) -> bool {
        self.re_playlist.iter().any(|re| re.is_match(url))
    }
}
