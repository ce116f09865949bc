use std::{env, path::PathBuf, str::FromStr};

use crate::{Error, Result, ENDPOINT, FILE_STEM, MAX_CONCURRENT, PAGE_MAX, PAGE_SIZE};

/// Knobs for a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Rows requested per page.
    pub page_size: usize,
    /// Pages `0..page_max` are fetched.
    pub page_max: usize,
    /// Ceiling on simultaneous fetches. Also the capacity of the result channel.
    pub max_concurrent: usize,
    pub endpoint: String,
    pub output_dir: PathBuf,
    pub file_stem: String,
    /// Append `-YYYY-MM-DD` to the output file names.
    pub date_stamp: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            page_max: PAGE_MAX,
            max_concurrent: MAX_CONCURRENT,
            endpoint: ENDPOINT.into(),
            output_dir: PathBuf::from("."),
            file_stem: FILE_STEM.into(),
            date_stamp: true,
        }
    }
}

impl Config {
    /// Defaults overridden by any `CATALOG_*` variables that are set.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = env_parse("CATALOG_PAGE_SIZE")? {
            config.page_size = v;
        }
        if let Some(v) = env_parse("CATALOG_PAGE_MAX")? {
            config.page_max = v;
        }
        if let Some(v) = env_parse("CATALOG_MAX_CONCURRENT")? {
            config.max_concurrent = v;
        }
        if let Ok(v) = env::var("CATALOG_ENDPOINT") {
            config.endpoint = v;
        }
        if let Ok(v) = env::var("CATALOG_OUTPUT_DIR") {
            config.output_dir = v.into();
        }
        if let Some(v) = env_parse("CATALOG_DATE_STAMP")? {
            config.date_stamp = v;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(Error::Config {
                key: "max_concurrent",
                reason: "must be at least 1".into(),
            });
        }
        if self.page_size == 0 {
            return Err(Error::Config {
                key: "page_size",
                reason: "must be at least 1".into(),
            });
        }
        if self.endpoint.is_empty() {
            return Err(Error::Config {
                key: "endpoint",
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Search URL without the trailing `page` parameter.
    pub fn base_url(&self) -> String {
        format!(
            "{}?q=*&type=book&order_by=published_at&rows={}&language=en",
            self.endpoint, self.page_size
        )
    }
}

fn env_parse<T>(key: &'static str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|e: T::Err| Error::Config {
            key,
            reason: format!("{raw:?}: {e}"),
        }),
        Err(_) => Ok(None),
    }
}
