mod cache;
mod cleanup;
mod decision;
mod extract;
mod fetch;
mod fs_utils;
mod install_state;
mod layout;
mod migrate;
mod switch;

pub use cache::{
    artifact_cache_path, garbage_collect, get_or_fetch, is_available_offline, CacheLookup,
    GcReport,
};
pub use cleanup::{clean_obsolete, CleanupReport};
pub use decision::{needs_cache_flush, needs_update};
pub use extract::{download_and_extract, ExtractOutcome};
pub use fetch::{FetchPolicy, Fetcher, HttpFetcher, RetryingFetcher, Sleeper, ThreadSleeper};
pub use install_state::{last_used_mode, read_version_record, write_version_record, InstallState};
pub use layout::{ensure_dir, BackupRoot, GameLayout, DEFAULT_DLC_SUBDIR};
pub use migrate::{activate, deactivate, switch_user_data, MigrationReport};
pub use switch::{
    clear_runtime_cache, LocationOutcome, LocationReport, ModeEngine, ModeSwitch,
    RuntimeCacheFlush, SwitchReport,
};
