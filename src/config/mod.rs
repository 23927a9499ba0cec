use config::{Config, ConfigError};
use once_cell::sync::Lazy;
use serde::Deserialize;

#[derive(Deserialize, Clone)]
pub struct DbConfig {
    pub location: String,
}

/// config properties for thumbnail generation
#[derive(Deserialize, Clone)]
pub struct ThumbnailConfig {
    pub location: String,
    pub size: u32,
}

/// config properties for the whole of this application
#[derive(Deserialize, Clone)]
pub struct FileTaggerConfig {
    pub database: DbConfig,
    pub thumbnails: ThumbnailConfig,
}

/// Parses the config file located at ./FileTagger.toml, if it exists.
/// If this fails to parse the file, the application will panic
pub fn parse_config() -> FileTaggerConfig {
    let builder = Config::builder()
        .add_source(config::File::with_name("./FileTagger.toml"))
        .build();
    // some errors are fine, such as not found
    if let Err(ConfigError::Foreign(e)) = builder {
        let message = e.to_string();
        if message.contains("not found") {
            log::warn!("No config file found. Continuing startup...");
            return TAGGER_CONFIG_DEFAULT.clone();
        }
        panic!("Failed to parse config file. Exception is {e}");
        // basically everything else is unrecoverable, though
    } else if let Err(e) = builder {
        log::error!("Failed to parse config file. Exception is {e}");
        panic!("Failed to parse config file. Exception is {e}");
    }
    let settings = builder.unwrap();
    settings
        .try_deserialize()
        .unwrap_or(TAGGER_CONFIG_DEFAULT.clone())
}

/// global variable for config, that way it doesn't need to be repeatedly parsed
pub static FILE_TAGGER_CONFIG: Lazy<FileTaggerConfig> = Lazy::new(parse_config);
static TAGGER_CONFIG_DEFAULT: Lazy<FileTaggerConfig> = Lazy::new(|| FileTaggerConfig {
    database: DbConfig {
        location: "./db.sqlite".to_string(),
    },
    thumbnails: ThumbnailConfig {
        location: "./thumbnails".to_string(),
        size: crate::previews::DEFAULT_THUMBNAIL_SIZE,
    },
});
