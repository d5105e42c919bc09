use std::{fmt::Display, path::PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub enum Locator {
    Local(PathBuf),
    Remote(String),
}

impl Locator {
    pub fn is_remote(&self) -> bool {
        matches!(self, Locator::Remote(_))
    }
}

impl Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Locator::*;
        match self {
            Local(path) => f.write_fmt(format_args!("[Local resource: {}]", path.display())),
            Remote(url) => f.write_fmt(format_args!("[URL: {url}]")),
        }
    }
}

const URL_REGEX_SPEC: &str = r"(?i)^(http|https)://(.+)$";

impl From<&str> for Locator {
    fn from(value: &str) -> Self {
        static URL_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(URL_REGEX_SPEC).unwrap());

        use Locator::*;

        if URL_REGEX.is_match(value) {
            Remote(value.to_string())
        } else {
            Local(value.into())
        }
    }
}
