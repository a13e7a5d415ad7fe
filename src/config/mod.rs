//! Settings for the engine, and the YAML merge primitive it shares with
//! composition.
//!
//! Settings are consolidated from tiers with field-by-field YAML merging:
//! 1. **Defaults** - built in
//! 2. **User** - `~/.hydra-compose/settings.yaml`
//! 3. **Project** - `<config-root>/.hydra-compose.yaml`
//! 4. **Environment** - `HYDRA_COMPOSE_*` variables
//!
//! ## Environment Variables
//! - `HYDRA_COMPOSE_USER_DIR` - User settings dir (default: `~/.hydra-compose`)
//! - `HYDRA_COMPOSE_BACKUP_DIR` - Snapshot directory name under the root
//! - `HYDRA_COMPOSE_MERGE_STRATEGY` - `auto`, `native` or `manual`

mod loader;
mod merge;
mod types;
pub mod watcher;

pub use loader::{PROJECT_SETTINGS_FILE, SettingsLoader, SettingsPaths, SettingsTier};
pub use merge::{NullPolicy, deep_merge, deep_merge_all, deep_merge_with};
pub use types::*;
