//! All known profiles
//!
//! Profiles come from the metadata store plus any `<name>.txt` in the cache
//! and bundled directories. Callers select profiles by index, as returned by
//! [`ProfileRegistry::profile_list`].

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use cb_core::types::{CheckResult, ResourceType};
use tokio::sync::broadcast;

use crate::config::EngineConfig;
use crate::error::RegistryError;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::profile::{Profile, ProfileEnv};
use crate::settings::MetadataStore;

const EVENT_CAPACITY: usize = 64;

pub struct ProfileRegistry {
    env: ProfileEnv,
    profiles: Vec<Arc<Profile>>,
}

impl ProfileRegistry {
    /// Open the metadata store and discover profiles under `config`.
    pub fn new(config: EngineConfig) -> Result<Self, RegistryError> {
        let store = MetadataStore::open(&config.metadata_path())?;
        let fetcher = HttpFetcher::from_config(&config)?;
        Ok(Self::with_fetcher(config, store, Arc::new(fetcher)))
    }

    pub fn with_fetcher(config: EngineConfig, store: MetadataStore, fetcher: Arc<dyn Fetcher>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let env = ProfileEnv {
            config: Arc::new(config),
            store: Arc::new(store),
            fetcher,
            events,
        };

        let mut names: BTreeSet<String> = env.store.names().into_iter().collect();
        names.extend(list_names(&env.config.cache_dir()));
        if let Some(bundled) = &env.config.bundled_dir {
            names.extend(list_names(bundled));
        }

        let profiles: Vec<_> = names.iter().map(|name| Profile::new(name, env.clone())).collect();
        for profile in &profiles {
            // Failures are logged by the profile; it stays unloaded.
            let _ = profile.load_header();
        }
        log::info!("Found {} content blocking profiles", profiles.len());

        Self { env, profiles }
    }

    /// Receive the name of every profile whose rules change.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.env.events.subscribe()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.env.config
    }

    pub fn profiles(&self) -> &[Arc<Profile>] {
        &self.profiles
    }

    pub fn profile(&self, name: &str) -> Option<Arc<Profile>> {
        self.profiles.iter().find(|profile| profile.name() == name).cloned()
    }

    pub fn profile_names(&self) -> Vec<String> {
        self.profiles.iter().map(|profile| profile.name().to_string()).collect()
    }

    /// Indices of the named profiles; unknown names are skipped.
    pub fn profile_list(&self, names: &[&str]) -> Vec<usize> {
        names
            .iter()
            .filter_map(|name| self.profiles.iter().position(|profile| profile.name() == *name))
            .collect()
    }

    /// First profile in `profiles` that blocks the request.
    pub fn check_url(
        &self,
        profiles: &[usize],
        base_url: &str,
        request_url: &str,
        resource_type: ResourceType,
    ) -> CheckResult {
        self.selected(profiles)
            .map(|profile| profile.check_url(base_url, request_url, resource_type))
            .find(|result| result.is_blocked)
            .unwrap_or_default()
    }

    pub fn style_sheet(&self, profiles: &[usize]) -> Vec<String> {
        self.selected(profiles).flat_map(|profile| profile.style_sheet()).collect()
    }

    pub fn style_sheet_black_list(&self, domain: &str, profiles: &[usize]) -> Vec<String> {
        self.selected(profiles)
            .flat_map(|profile| profile.style_sheet_black_list(domain))
            .collect()
    }

    pub fn style_sheet_white_list(&self, domain: &str, profiles: &[usize]) -> Vec<String> {
        self.selected(profiles)
            .flat_map(|profile| profile.style_sheet_white_list(domain))
            .collect()
    }

    /// Start a background update of the named profile.
    pub fn update_profile(&self, name: &str) -> bool {
        self.profile(name).map_or(false, |profile| profile.download_rules())
    }

    pub fn set_wildcards_enabled(&self, enabled: bool) {
        for profile in &self.profiles {
            profile.set_wildcards_enabled(enabled);
        }
    }

    fn selected<'a>(&'a self, profiles: &'a [usize]) -> impl Iterator<Item = &'a Arc<Profile>> + 'a {
        profiles.iter().filter_map(|&index| self.profiles.get(index))
    }
}

/// Stems of the `.txt` files in `dir`.
fn list_names(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().map_or(false, |ext| ext == "txt"))
        .filter_map(|path| path.file_stem().and_then(|stem| stem.to_str()).map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetch::FetchFuture;

    struct OfflineFetcher;

    impl Fetcher for OfflineFetcher {
        fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a> {
            Box::pin(async move { Err(FetchError::Other(format!("offline: {url}"))) })
        }
    }

    fn registry(tag: &str, lists: &[(&str, &str)]) -> (ProfileRegistry, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("cb-registry-{}-{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("blocking")).expect("create cache dir");
        for (name, text) in lists {
            fs::write(dir.join("blocking").join(format!("{name}.txt")), text).expect("write list");
        }

        let config = EngineConfig {
            data_dir: dir.clone(),
            ..EngineConfig::default()
        };
        let registry = ProfileRegistry::with_fetcher(config, MetadataStore::in_memory(), Arc::new(OfflineFetcher));
        (registry, dir)
    }

    const ADS: &str = "[Adblock Plus 2.0]\n! Title: Ads\n||ads.example.com^\n##.ad\nexample.com##.promo\n";
    const PRIVACY: &str = "[Adblock Plus 2.0]\n! Title: Privacy\n||tracker.example^\n##.cookie-banner\nexample.com#@#.promo\n";

    #[test]
    fn discovers_lists_in_cache_dir() {
        let (registry, dir) = registry("discover", &[("privacy", PRIVACY), ("ads", ADS)]);
        fs::write(dir.join("blocking").join("notes.md"), "ignored").expect("write");

        assert_eq!(registry.profile_names(), ["ads".to_string(), "privacy".to_string()]);
        assert_eq!(registry.profile("privacy").map(|p| p.title()), Some("Privacy".to_string()));
        assert!(registry.profile("missing").is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn first_blocking_profile_wins() {
        let (registry, dir) = registry("check", &[("ads", ADS), ("privacy", PRIVACY)]);
        let all = registry.profile_list(&["privacy", "ads", "unknown"]);
        assert_eq!(all, [1, 0]);

        let result = registry.check_url(&all, "http://news.example.org/", "http://ads.example.com/x", ResourceType::Script);
        assert!(result.is_blocked);
        assert_eq!(result.profile, "ads");

        let result = registry.check_url(&all, "http://news.example.org/", "http://tracker.example/p", ResourceType::Image);
        assert_eq!(result.profile, "privacy");

        let ads_only = registry.profile_list(&["ads"]);
        assert!(!registry.check_url(&ads_only, "", "http://tracker.example/p", ResourceType::Image).is_blocked);
        assert!(!registry.check_url(&[], "", "http://ads.example.com/", ResourceType::Other).is_blocked);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn style_sheets_are_aggregated() {
        let (registry, dir) = registry("styles", &[("ads", ADS), ("privacy", PRIVACY)]);
        let all = registry.profile_list(&["ads", "privacy"]);

        assert_eq!(registry.style_sheet(&all), [".ad".to_string(), ".cookie-banner".to_string()]);
        assert_eq!(registry.style_sheet_black_list("example.com", &all), [".promo".to_string()]);
        assert_eq!(registry.style_sheet_white_list("example.com", &all), [".promo".to_string()]);
        assert!(registry.style_sheet_black_list("other.com", &all).is_empty());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn update_of_unknown_profile_fails() {
        let (registry, dir) = registry("update", &[("ads", ADS)]);
        assert!(!registry.update_profile("missing"));
        // No update URL in the list.
        assert!(!registry.update_profile("ads"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn wildcard_switch_reaches_every_profile() {
        let (registry, dir) = registry("wild", &[("wild", "[Adblock Plus 2.0]\nad*.example.com\n")]);
        let all = registry.profile_list(&["wild"]);
        assert!(registry.check_url(&all, "", "http://adserver.example.com/", ResourceType::Other).is_blocked);

        registry.set_wildcards_enabled(false);
        assert!(!registry.check_url(&all, "", "http://adserver.example.com/", ResourceType::Other).is_blocked);

        let _ = fs::remove_dir_all(&dir);
    }
}
