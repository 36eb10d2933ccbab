use std::path::PathBuf;

/// Resolves a `--cookies-from-browser` argument for the YouTube downloader
/// from a configured browser name (§4.1). Librewolf needs its profile
/// directory found manually since the downloader only recognises `firefox`.
pub fn cookie_browser_arg(browser: &str) -> String {
    if browser.eq_ignore_ascii_case("librewolf") {
        if let Some(profile) = resolve_librewolf_profile() {
            return format!("firefox:{}", profile.display());
        }
    }
    browser.to_string()
}

fn librewolf_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        dirs::home_dir().map(|h| h.join(".librewolf"))
    }
    #[cfg(target_os = "macos")]
    {
        dirs::home_dir().map(|h| h.join("Library/Application Support/librewolf"))
    }
    #[cfg(target_os = "windows")]
    {
        dirs::data_dir().map(|d| d.join("librewolf"))
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        None
    }
}

/// Parses `profiles.ini` preferring an `Install*` section's `Default=` value,
/// then any `Profile*` section with `Default=1`, then a `.default-default`
/// directory, then a `.default` directory.
fn resolve_librewolf_profile() -> Option<PathBuf> {
    let root = librewolf_config_dir()?;
    let ini_path = root.join("profiles.ini");
    let content = std::fs::read_to_string(&ini_path).ok()?;

    let sections = parse_ini(&content);

    for (name, kv) in &sections {
        if name.starts_with("Install") {
            if let Some(path) = kv.get("Default") {
                return Some(root.join(path));
            }
        }
    }

    for (name, kv) in &sections {
        if name.starts_with("Profile") {
            if kv.get("Default").map(|v| v == "1").unwrap_or(false) {
                if let Some(path) = kv.get("Path") {
                    return Some(root.join(path));
                }
            }
        }
    }

    if let Ok(entries) = std::fs::read_dir(&root) {
        let mut fallback_default = None;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.ends_with(".default-default") {
                return Some(path);
            }
            if name.ends_with(".default") {
                fallback_default = Some(path);
            }
        }
        if fallback_default.is_some() {
            return fallback_default;
        }
    }

    None
}

fn parse_ini(content: &str) -> Vec<(String, std::collections::HashMap<String, String>)> {
    let mut sections = Vec::new();
    let mut current_name = String::new();
    let mut current_kv = std::collections::HashMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            if !current_name.is_empty() {
                sections.push((current_name.clone(), current_kv.clone()));
            }
            current_name = line[1..line.len() - 1].to_string();
            current_kv.clear();
        } else if let Some((k, v)) = line.split_once('=') {
            current_kv.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
    if !current_name.is_empty() {
        sections.push((current_name, current_kv));
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ini_finds_install_default() {
        let ini = "[Install1234]\nDefault=abc.default-release\n\n[Profile0]\nDefault=1\nPath=abc.default-release\n";
        let sections = parse_ini(ini);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].1.get("Default").unwrap(), "abc.default-release");
    }

    #[test]
    fn non_librewolf_browser_passthrough() {
        assert_eq!(cookie_browser_arg("firefox"), "firefox");
        assert_eq!(cookie_browser_arg("chrome"), "chrome");
    }
}
