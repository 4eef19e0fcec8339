use std::env;

use crate::catalog::Locale;
use crate::query::DEFAULT_PER_PAGE;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub lms_base_url: String,
    pub catalog_api_base_url: String,
    pub default_locale: Locale,
    pub courses_per_page: u32,
}

impl Config {
    pub fn from_env() -> Self {
        let lms_base_url = env::var("LMS_BASE_URL").unwrap_or_else(|_| "http://localhost:18000".into());
        Config {
            port: env::var("PORT").ok().and_then(|s| s.parse().ok()).unwrap_or(8081),
            catalog_api_base_url: env::var("ENTERPRISE_CATALOG_API_BASE_URL")
                .unwrap_or_else(|_| lms_base_url.clone()),
            lms_base_url,
            default_locale: Locale::new(&env::var("DEFAULT_LOCALE").unwrap_or_default()),
            courses_per_page: env::var("COURSES_PER_PAGE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_PER_PAGE),
        }
    }
}
