//! A single filter list profile
//!
//! A profile moves `Unloaded → HeaderLoaded → RulesLoaded` and back to
//! `Unloaded` on [`Profile::clear`]. Rules are loaded lazily on the first
//! query. Updates are fetched asynchronously, verified, written to the cache
//! directory and swapped in as a freshly built [`RuleSet`]; readers keep the
//! old set until they drop it.

use std::fs;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use cb_compiler::{build_rule_set, ListHeader};
use cb_core::types::{CheckResult, ResourceType, RuleSetStats};
use cb_core::RuleSet;
use tokio::sync::broadcast;

use crate::checksum;
use crate::config::EngineConfig;
use crate::error::{FetchError, ProfileError, UpdateError};
use crate::fetch::Fetcher;
use crate::settings::{MetadataStore, ProfileCategory, ProfileFlags};

const SECS_PER_DAY: u64 = 86_400;

// =============================================================================
// Shared Environment
// =============================================================================

/// Everything profiles of one registry share.
#[derive(Clone)]
pub struct ProfileEnv {
    pub config: Arc<EngineConfig>,
    pub store: Arc<MetadataStore>,
    pub fetcher: Arc<dyn Fetcher>,
    /// Carries the name of each profile whose rules changed.
    pub events: broadcast::Sender<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileState {
    Unloaded,
    HeaderLoaded,
    RulesLoaded,
}

#[derive(Debug, Default)]
struct HeaderInfo {
    loaded: bool,
    header: ListHeader,
}

// =============================================================================
// Profile
// =============================================================================

pub struct Profile {
    name: String,
    env: ProfileEnv,
    enable_wildcards: AtomicBool,
    is_updating: AtomicBool,
    header: RwLock<HeaderInfo>,
    rules: RwLock<Option<Arc<RuleSet>>>,
    /// Serializes file reads and rule set builds.
    load_lock: Mutex<()>,
    /// Bumped by every `clear`; a build started before it is discarded.
    generation: AtomicU64,
}

impl Profile {
    pub fn new(name: &str, env: ProfileEnv) -> Arc<Self> {
        let enable_wildcards = env.config.enable_wildcards;
        Arc::new(Self {
            name: name.to_string(),
            env,
            enable_wildcards: AtomicBool::new(enable_wildcards),
            is_updating: AtomicBool::new(false),
            header: RwLock::new(HeaderInfo::default()),
            rules: RwLock::new(None),
            load_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> String {
        let settings = self.env.store.get(&self.name);
        if settings.flags.contains(ProfileFlags::HAS_CUSTOM_TITLE) {
            if let Some(title) = &settings.title {
                return title.clone();
            }
        }

        self.read_header()
            .header
            .title
            .clone()
            .or(settings.title)
            .unwrap_or_else(|| "(Unknown)".to_string())
    }

    pub fn update_url(&self) -> Option<String> {
        let settings = self.env.store.get(&self.name);
        let custom = settings
            .update_url
            .clone()
            .filter(|_| settings.flags.contains(ProfileFlags::HAS_CUSTOM_UPDATE_URL));

        custom
            .or_else(|| self.read_header().header.update_url.clone())
            .or(settings.update_url)
    }

    pub fn category(&self) -> ProfileCategory {
        self.env.store.get(&self.name).category
    }

    pub fn languages(&self) -> Vec<String> {
        self.env.store.get(&self.name).languages
    }

    pub fn last_update(&self) -> Option<u64> {
        self.env.store.get(&self.name).last_update
    }

    /// Days between updates: the configured interval, else the list's
    /// `Expires`, else 0 (never).
    pub fn update_interval(&self) -> u32 {
        let configured = self.env.store.get(&self.name).update_interval;
        if configured > 0 {
            return configured;
        }
        self.read_header().header.expires_days().unwrap_or(0)
    }

    pub fn is_updating(&self) -> bool {
        self.is_updating.load(Ordering::Acquire)
    }

    pub fn state(&self) -> ProfileState {
        if self.current_rules().is_some() {
            ProfileState::RulesLoaded
        } else if self.read_header().loaded {
            ProfileState::HeaderLoaded
        } else {
            ProfileState::Unloaded
        }
    }

    /// Statistics of the loaded rule set, if any.
    pub fn stats(&self) -> Option<RuleSetStats> {
        self.current_rules().map(|set| set.stats())
    }

    /// The cache file if present, else the bundled copy.
    pub fn path(&self) -> Option<PathBuf> {
        let cache = self.env.config.cache_path(&self.name);
        if cache.is_file() {
            return Some(cache);
        }
        self.env.config.bundled_path(&self.name).filter(|path| path.is_file())
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Read the header block and start an update if one is due.
    pub fn load_header(self: &Arc<Self>) -> Result<(), ProfileError> {
        let path = self.path().ok_or_else(|| ProfileError::NotFound(self.name.clone()))?;
        let result = fs::File::open(&path)
            .map_err(|source| ProfileError::Io {
                path: path.clone(),
                source,
            })
            .and_then(|file| {
                ListHeader::read(BufReader::new(file)).map_err(|err| ProfileError::from_header(path.clone(), err))
            });

        match result {
            Ok(header) => {
                self.store_header(header);
                if self.is_update_due(unix_now()) {
                    self.download_rules();
                }
                Ok(())
            }
            Err(err) => {
                log::error!("Failed to load content blocking profile {}: {}", self.name, err);
                Err(err)
            }
        }
    }

    /// Parse the list into a new rule set.
    ///
    /// A list without rules starts a download and returns `false`.
    pub fn load_rules(self: &Arc<Self>) -> bool {
        let _guard = self.load_lock.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if self.current_rules().is_some() {
                return true;
            }

            let generation = self.generation.load(Ordering::Acquire);
            match self.build_from_file() {
                Ok(set) => {
                    if self.store_rules(set, generation) {
                        return true;
                    }
                    // Cleared while building; build again with the current settings.
                }
                Err(ProfileError::EmptyBody(_)) => {
                    self.download_rules();
                    return false;
                }
                Err(err) => {
                    log::error!("Failed to load content blocking profile {}: {}", self.name, err);
                    return false;
                }
            }
        }
    }

    /// Install a built rule set unless [`Profile::clear`] ran after
    /// `generation` was read.
    fn store_rules(&self, set: RuleSet, generation: u64) -> bool {
        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        if self.generation.load(Ordering::Acquire) != generation {
            drop(rules);
            log::debug!("Discarded stale rules of content blocking profile {}", self.name);
            retire(Arc::new(set));
            return false;
        }

        let old = rules.replace(Arc::new(set));
        drop(rules);
        if let Some(old) = old {
            retire(old);
        }
        true
    }

    fn build_from_file(&self) -> Result<RuleSet, ProfileError> {
        let path = self.path().ok_or_else(|| ProfileError::NotFound(self.name.clone()))?;
        let text = fs::read_to_string(&path).map_err(|source| ProfileError::Io {
            path: path.clone(),
            source,
        })?;

        let header = ListHeader::parse(&text).map_err(|err| ProfileError::from_header(path.clone(), err))?;
        let has_body = header.has_body;
        self.store_header(header);
        if !has_body {
            return Err(ProfileError::EmptyBody(self.name.clone()));
        }

        let started = Instant::now();
        let set = build_rule_set(&text, self.enable_wildcards.load(Ordering::Acquire));
        let stats = set.stats();
        log::info!(
            "Loaded profile {}: {} network rules ({} exceptions), {} cosmetic rules, {} dropped in {:.1}ms",
            self.name,
            stats.network_rules,
            stats.exception_rules,
            stats.global_selectors + stats.black_list_entries + stats.white_list_entries,
            stats.dropped_lines,
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(set)
    }

    /// Drop the loaded rules. The old rule set is freed off the caller's
    /// thread.
    pub fn clear(&self) {
        let old = {
            let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
            self.generation.fetch_add(1, Ordering::AcqRel);
            rules.take()
        };
        self.header.write().unwrap_or_else(PoisonError::into_inner).loaded = false;
        if let Some(set) = old {
            retire(set);
        }
    }

    /// Toggle wildcard support; rules are rebuilt on next use.
    pub fn set_wildcards_enabled(&self, enabled: bool) {
        if self.enable_wildcards.swap(enabled, Ordering::AcqRel) != enabled {
            self.clear();
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn check_url(self: &Arc<Self>, base_url: &str, request_url: &str, resource_type: ResourceType) -> CheckResult {
        let Some(set) = self.loaded_rules() else {
            return CheckResult::default();
        };

        match set.check_url(base_url, request_url, resource_type) {
            Some(rule) => {
                log::debug!("Blocked {} by {} ({})", request_url, rule.text, self.name);
                CheckResult::blocked_by(&self.name)
            }
            None => CheckResult::default(),
        }
    }

    pub fn style_sheet(self: &Arc<Self>) -> Vec<String> {
        self.loaded_rules()
            .map(|set| set.style_sheet().to_vec())
            .unwrap_or_default()
    }

    pub fn style_sheet_black_list(self: &Arc<Self>, domain: &str) -> Vec<String> {
        self.loaded_rules()
            .map(|set| set.style_sheet_black_list(domain).to_vec())
            .unwrap_or_default()
    }

    pub fn style_sheet_white_list(self: &Arc<Self>, domain: &str) -> Vec<String> {
        self.loaded_rules()
            .map(|set| set.style_sheet_white_list(domain).to_vec())
            .unwrap_or_default()
    }

    // =========================================================================
    // Updates
    // =========================================================================

    /// Start a background update on the current tokio runtime.
    ///
    /// Returns `false` if an update is already running, the update URL is
    /// unusable, or there is no runtime.
    pub fn download_rules(self: &Arc<Self>) -> bool {
        let url = match self.checked_update_url() {
            Ok(url) => url,
            Err(err) => {
                log::error!("Failed to update content blocking profile {}: {}", self.name, err);
                return false;
            }
        };

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            log::warn!("Cannot update content blocking profile {} without a tokio runtime", self.name);
            return false;
        };

        if self.begin_update().is_err() {
            return false;
        }

        log::info!("Updating content blocking profile {} from {}", self.name, url);
        let profile = Arc::clone(self);
        handle.spawn(async move {
            if let Err(err) = profile.fetch_and_apply(url).await {
                log::error!("Failed to update content blocking profile {}: {}", profile.name, err);
            }
        });
        true
    }

    /// Run one update cycle to completion.
    pub async fn update(self: &Arc<Self>) -> Result<(), UpdateError> {
        let url = self.checked_update_url()?;
        self.begin_update()?;
        log::info!("Updating content blocking profile {} from {}", self.name, url);
        self.fetch_and_apply(url).await
    }

    async fn fetch_and_apply(self: &Arc<Self>, url: String) -> Result<(), UpdateError> {
        let result = self.env.fetcher.fetch(&url).await;
        let profile = Arc::clone(self);
        match tokio::task::spawn_blocking(move || profile.apply_update(result)).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.is_updating.store(false, Ordering::Release);
                Err(UpdateError::Task(err.to_string()))
            }
        }
    }

    /// Apply a finished download. On any error the cache file, the loaded
    /// rules and `last_update` are left as they were.
    pub fn apply_update(self: &Arc<Self>, download: Result<Vec<u8>, FetchError>) -> Result<(), UpdateError> {
        self.is_updating.store(false, Ordering::Release);

        let data = download?;
        let text = String::from_utf8_lossy(&data);
        let first_line = text.lines().next().unwrap_or_default();
        if !cb_compiler::is_list_header(first_line) {
            return Err(UpdateError::InvalidHeader);
        }

        checksum::verify(&text)?;

        let content = match self.update_url() {
            Some(url) => with_update_url(&text, &url),
            None => text.into_owned(),
        };

        let path = self.env.config.cache_path(&self.name);
        write_atomic(&path, &content)?;

        let now = unix_now();
        self.env.store.update(&self.name, |settings| settings.last_update = Some(now))?;

        self.reload();
        log::info!("Updated content blocking profile {}", self.name);
        let _ = self.env.events.send(self.name.clone());
        Ok(())
    }

    /// Rebuild from disk, keeping the loaded state the profile had.
    fn reload(self: &Arc<Self>) {
        let _guard = self.load_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.current_rules().is_none() {
            if let Err(err) = self.refresh_header() {
                log::error!("Failed to reload content blocking profile {}: {}", self.name, err);
            }
            return;
        }

        let generation = self.generation.load(Ordering::Acquire);
        match self.build_from_file() {
            Ok(set) => {
                self.store_rules(set, generation);
            }
            Err(err) => log::error!("Failed to reload content blocking profile {}: {}", self.name, err),
        }
    }

    fn refresh_header(&self) -> Result<(), ProfileError> {
        let path = self.path().ok_or_else(|| ProfileError::NotFound(self.name.clone()))?;
        let file = fs::File::open(&path).map_err(|source| ProfileError::Io {
            path: path.clone(),
            source,
        })?;
        let header = ListHeader::read(BufReader::new(file)).map_err(|err| ProfileError::from_header(path, err))?;
        self.store_header(header);
        Ok(())
    }

    fn checked_update_url(&self) -> Result<String, UpdateError> {
        let url = self.update_url().filter(|url| !url.is_empty()).ok_or(UpdateError::MissingUpdateUrl)?;
        match reqwest::Url::parse(&url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(url),
            _ => Err(UpdateError::InvalidUpdateUrl(url)),
        }
    }

    fn begin_update(&self) -> Result<(), UpdateError> {
        self.is_updating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| UpdateError::AlreadyUpdating)
    }

    fn is_update_due(&self, now: u64) -> bool {
        let interval = u64::from(self.update_interval());
        if interval == 0 || self.is_updating() {
            return false;
        }
        match self.last_update() {
            Some(last) => now.saturating_sub(last) / SECS_PER_DAY > interval,
            None => true,
        }
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn store_header(&self, header: ListHeader) {
        let mut info = self.header.write().unwrap_or_else(PoisonError::into_inner);
        info.header = header;
        info.loaded = true;
    }

    fn read_header(&self) -> std::sync::RwLockReadGuard<'_, HeaderInfo> {
        self.header.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_rules(&self) -> Option<Arc<RuleSet>> {
        self.rules.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn loaded_rules(self: &Arc<Self>) -> Option<Arc<RuleSet>> {
        if let Some(set) = self.current_rules() {
            return Some(set);
        }
        if !self.load_rules() {
            return None;
        }
        self.current_rules()
    }
}

/// Insert a `! URL:` line after the header unless the list has one.
fn with_update_url(text: &str, url: &str) -> String {
    let has_url = text
        .lines()
        .skip(1)
        .take_while(|line| line.trim_start().starts_with('!') || line.trim().is_empty())
        .any(|line| {
            let compact: String = line.chars().filter(|c| *c != ' ').collect();
            compact.to_ascii_lowercase().starts_with("!url:")
        });
    if has_url {
        return text.to_string();
    }

    match text.split_once('\n') {
        Some((header, rest)) => format!("{header}\n! URL: {url}\n{rest}"),
        None => format!("{text}\n! URL: {url}\n"),
    }
}

fn write_atomic(path: &std::path::Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("txt.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)
}

/// Free a rule set in the background.
fn retire(set: Arc<RuleSet>) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(move || drop(set));
        }
        Err(_) => {
            std::thread::spawn(move || drop(set));
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}
