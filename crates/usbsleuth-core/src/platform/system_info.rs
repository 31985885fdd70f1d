/// Host identity shown on the welcome banner.
///
/// Everything is best effort: unknown values read as `"unknown"` rather than
/// failing, since the banner is purely informational.
use chrono::{DateTime, Local};
use serde::Serialize;
use sysinfo::System;

const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub collected_at: DateTime<Local>,
    pub user: String,
    pub host_name: String,
    /// Distribution or product name, e.g. `Windows` or `Ubuntu`.
    pub os: String,
    /// Long version string, e.g. `Windows 11 (26100)` or `Linux 24.04 Ubuntu`.
    pub os_version: String,
    pub kernel_version: String,
    pub architecture: String,
}

impl SystemInfo {
    pub fn collect() -> Self {
        let os_version = System::long_os_version().or_else(System::os_version);
        Self {
            collected_at: Local::now(),
            user: first_env(&["USERNAME", "USER", "LOGNAME"]),
            host_name: or_unknown(System::host_name()),
            os: or_unknown(System::name()),
            os_version: or_unknown(os_version),
            kernel_version: or_unknown(System::kernel_version()),
            architecture: or_unknown(System::cpu_arch()),
        }
    }

    /// `(label, value)` rows in display order.
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            (
                "Date and time",
                self.collected_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
            ("User", self.user.clone()),
            ("Computer name", self.host_name.clone()),
            ("Operating system", self.os.clone()),
            ("OS version", self.os_version.clone()),
            ("Kernel", self.kernel_version.clone()),
            ("Architecture", self.architecture.clone()),
        ]
    }
}

/// Accepts both `String` and `Option<String>` so the call sites read the same
/// whichever form the `sysinfo` accessor returns.
fn or_unknown(value: impl Into<Option<String>>) -> String {
    value
        .into()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_owned())
}

fn first_env(names: &[&str]) -> String {
    let value = names
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()));
    or_unknown(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_fills_every_row() {
        let info = SystemInfo::collect();
        let rows = info.rows();
        assert_eq!(rows.len(), 7);
        assert!(rows.iter().all(|(_, v)| !v.is_empty()));
    }

    #[test]
    fn rows_include_os_version() {
        let info = SystemInfo::collect();
        let rows = info.rows();
        let (_, version) = rows
            .iter()
            .find(|(label, _)| *label == "OS version")
            .unwrap();
        assert_eq!(version, &info.os_version);
    }

    #[test]
    fn blank_values_read_as_unknown() {
        assert_eq!(or_unknown(None::<String>), UNKNOWN);
        assert_eq!(or_unknown(Some("  ".to_owned())), UNKNOWN);
        assert_eq!(or_unknown("x86_64".to_owned()), "x86_64");
    }
}
