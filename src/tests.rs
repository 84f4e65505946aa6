#[cfg(test)]
mod tests {
    use crate::config;
    use crate::platform::tests::host;
    use crate::platform::{HostArch, HostOs};
    use crate::types::{AppStore, InstallMethod, Strategy, TrackedApp};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let store = AppStore::default();
        assert!(store.apps.is_empty());
        assert_eq!(store.settings.default_method, InstallMethod::Auto);
        assert_eq!(store.settings.github_api_url, "https://api.github.com");
    }

    #[test]
    fn test_missing_config_file_loads_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(store, AppStore::default());
    }

    #[test]
    fn test_store_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut store = AppStore::default();
        let mut app = TrackedApp::new("fd", "https://github.com/sharkdp/fd");
        app.installed_version = "9.0.0".to_string();
        app.install_method = Some(Strategy::Binary);
        app.binary_path = Some("/home/tester/.local/bin/fd".to_string());
        store.apps.push(app);
        store.settings.default_method = InstallMethod::UserPath;

        config::save_to(&path, &store).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"version\": \"9.0.0\""));
        assert!(raw.contains("\"install_method\": \"binary\""));
        assert!(!raw.contains("install_error"));

        assert_eq!(config::load_from(&path).unwrap(), store);
    }

    #[test]
    fn test_corrupt_config_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        let err = config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Could not parse config file"));
    }

    #[test]
    fn test_backfill_detects_binary_on_path() {
        let bin_dir = TempDir::new().unwrap();
        fs::write(bin_dir.path().join("fd"), "").unwrap();

        let mut env = host(HostOs::Linux, HostArch::Amd64);
        env.path_dirs = vec![bin_dir.path().to_path_buf()];

        let mut store = AppStore::default();
        let mut installed = TrackedApp::new("fd", "https://github.com/sharkdp/fd");
        installed.installed_version = "9.0.0".to_string();
        let never_installed = TrackedApp::new("rg", "https://github.com/BurntSushi/ripgrep");
        store.apps = vec![installed, never_installed];

        config::backfill_install_methods(&mut store, &env);

        let fd = store.find("fd").unwrap();
        assert_eq!(fd.install_method, Some(Strategy::Binary));
        assert_eq!(
            fd.binary_path.as_deref(),
            Some(bin_dir.path().join("fd").to_string_lossy().as_ref())
        );
        assert_eq!(store.find("rg").unwrap().install_method, None);
    }
}
