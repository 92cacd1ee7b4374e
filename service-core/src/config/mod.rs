use crate::error::AppError;
use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Locate the `config/` directory of a service crate.
///
/// Binaries are started either from the workspace root or from inside the
/// service crate, so both layouts are accepted.
pub fn configuration_directory(base_path: &Path, service_dir: &str) -> PathBuf {
    if base_path.ends_with(service_dir) {
        base_path.join("config")
    } else {
        base_path.join(service_dir).join("config")
    }
}

/// Load layered settings: `config/base.yaml` first, then `APP_`-prefixed
/// environment variables (`APP_SECTION__KEY`).
pub fn load_settings<T: DeserializeOwned>(service_dir: &str) -> Result<T, AppError> {
    dotenvy::dotenv().ok();

    let base_path = std::env::current_dir()?;
    let configuration_directory = configuration_directory(&base_path, service_dir);

    let settings = Config::builder()
        .add_source(File::from(configuration_directory.join("base.yaml")).required(true))
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("guard.public_paths"),
        )
        .build()?;

    Ok(settings.try_deserialize::<T>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_from_workspace_root() {
        let dir = configuration_directory(Path::new("/srv/portal"), "portal-frontend");
        assert_eq!(dir, PathBuf::from("/srv/portal/portal-frontend/config"));
    }

    #[test]
    fn resolves_from_crate_directory() {
        let dir = configuration_directory(Path::new("/srv/portal/portal-frontend"), "portal-frontend");
        assert_eq!(dir, PathBuf::from("/srv/portal/portal-frontend/config"));
    }
}
