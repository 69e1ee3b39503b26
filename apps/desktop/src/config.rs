use std::{fs, path::Path};

use client_core::PanelSettings;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "voicecomm.toml";

/// Defaults, then the toml file at `path` if present, then `APP__*` env vars.
pub fn load_settings(path: &Path) -> PanelSettings {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => match toml::from_str::<PanelSettings>(&raw) {
            Ok(settings) => {
                info!(path = %path.display(), "loaded panel settings");
                settings
            }
            Err(err) => {
                warn!(path = %path.display(), "ignoring malformed settings file: {err}");
                PanelSettings::default()
            }
        },
        Err(_) => PanelSettings::default(),
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_env_overrides(settings: &mut PanelSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = parse_var(&lookup, "APP__VOLUME_DEBOUNCE_MS") {
        settings.volume_debounce_ms = v;
    }
    if let Some(v) = parse_var(&lookup, "APP__LEAVE_RETRY_ATTEMPTS") {
        settings.leave_retry_attempts = v;
    }
    if let Some(v) = parse_var(&lookup, "APP__LEAVE_RETRY_DELAY_MS") {
        settings.leave_retry_delay_ms = v;
    }
    if let Some(v) = parse_var(&lookup, "APP__EVENT_BUFFER") {
        settings.event_buffer = v;
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("ignoring unparsable {key}={raw}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn env_overrides_replace_defaults() {
        let mut settings = PanelSettings::default();
        apply_env_overrides(
            &mut settings,
            lookup(&[
                ("APP__VOLUME_DEBOUNCE_MS", "500"),
                ("APP__LEAVE_RETRY_ATTEMPTS", " 4 "),
            ]),
        );
        assert_eq!(settings.volume_debounce_ms, 500);
        assert_eq!(settings.leave_retry_attempts, 4);
        assert_eq!(settings.leave_retry_delay_ms, 250);
    }

    #[test]
    fn unparsable_env_values_are_ignored() {
        let mut settings = PanelSettings::default();
        apply_env_overrides(&mut settings, lookup(&[("APP__EVENT_BUFFER", "lots")]));
        assert_eq!(settings, PanelSettings::default());
    }

    #[test]
    fn settings_file_fills_missing_keys_with_defaults() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("voicecomm_settings_{suffix}.toml"));
        fs::write(&path, "volume_debounce_ms = 150\n").expect("write settings");

        let settings = load_settings(&path);
        assert_eq!(settings.volume_debounce_ms, 150);
        assert_eq!(settings.event_buffer, PanelSettings::default().event_buffer);

        fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn missing_file_uses_defaults() {
        let settings = load_settings(Path::new("/nonexistent/voicecomm.toml"));
        assert_eq!(
            settings.volume_debounce_ms,
            client_core::settings::DEFAULT_VOLUME_DEBOUNCE_MS
        );
    }
}
