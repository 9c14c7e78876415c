use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::Deserialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::counter::Thresholds;
use crate::landmarks::TrackedJoint;

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Capture {
    #[serde(default = "default_frame_skip")]
    pub frame_skip: u32,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
}

fn default_frame_skip() -> u32 {
    3
}

fn default_min_confidence() -> f32 {
    0.8
}

impl Default for Capture {
    fn default() -> Self {
        Self {
            frame_skip: default_frame_skip(),
            min_confidence: default_min_confidence(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub meta: Meta,
    pub thresholds: Thresholds,
    pub joint: TrackedJoint,
    #[serde(default)]
    pub capture: Capture,
}

impl Profile {
    pub fn parse(txt: &str) -> Result<Self> {
        let profile: Profile = toml::from_str(txt)?;
        validate_profile(&profile)?;
        Ok(profile)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let txt = fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
        Self::parse(&txt).map_err(|e| anyhow!("failed to parse {}: {e}", path.display()))
    }

    pub fn bundled_default() -> Result<Self> {
        Self::parse(default_profile_text())
    }

    pub fn display_name(&self) -> &str {
        self.meta.name.as_deref().unwrap_or("unnamed")
    }
}

#[derive(Debug, Clone)]
pub struct ConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

fn config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("cannot resolve home directory"))?;
    Ok(dirs.home_dir().join(".config").join("repctl"))
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl ConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        Self::load_from(config_dir()?)
    }

    pub fn load_from(cfgdir: PathBuf) -> Result<Self> {
        let profdir = cfgdir.join("profiles");
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = cfgdir.join("active");
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let (active_name, profile) = read_active(&profdir, &active_ptr)?;

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    /// Re-read the active pointer and its profile from disk. On error the
    /// last good profile stays loaded.
    pub fn reload(&mut self) -> Result<()> {
        let (name, profile) = read_active(&self.profiles_dir, &self.active_ptr)?;
        self.active_name = name;
        self.profile = profile;
        Ok(())
    }

    /// Load the named profile for this process only (`run --profile <name>`).
    pub fn select(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        self.profile = Profile::load_file(&p)?;
        self.active_name = name.to_string();
        Ok(())
    }

    /// Make the named profile active and move the pointer (`repctl use <name>`).
    pub fn set_active(&mut self, name: &str) -> Result<()> {
        self.select(name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }

    pub fn paths_report(&self) -> serde_json::Value {
        let p = &self.profile;
        serde_json::json!({
            "config_dir": self.config_dir,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "profile": {
                "name": p.display_name(),
                "thresholds": { "down": p.thresholds.down, "up": p.thresholds.up },
                "joint": p.joint,
                "capture": {
                    "frame_skip": p.capture.frame_skip,
                    "min_confidence": p.capture.min_confidence,
                },
            },
        })
    }
}

fn read_active(profiles_dir: &Path, active_ptr: &Path) -> Result<(String, Profile)> {
    let name = fs::read_to_string(active_ptr)?.trim().to_string();
    if name.is_empty() {
        return Err(anyhow!("active pointer {} is empty", active_ptr.display()));
    }
    let profile = Profile::load_file(&profiles_dir.join(format!("{name}.toml")))?;
    Ok((name, profile))
}

fn validate_profile(p: &Profile) -> Result<()> {
    let th = &p.thresholds;
    for (name, v) in [("down", th.down), ("up", th.up)] {
        if !v.is_finite() || !(0.0..=180.0).contains(&v) {
            return Err(anyhow!("thresholds.{name} must be within [0, 180] degrees"));
        }
    }
    if th.down >= th.up {
        return Err(anyhow!(
            "thresholds.down ({}) must be below thresholds.up ({})",
            th.down,
            th.up
        ));
    }
    if !p.joint.is_distinct() {
        return Err(anyhow!("joint landmarks must be three distinct points"));
    }
    if p.capture.frame_skip == 0 {
        return Err(anyhow!("capture.frame_skip must be at least 1"));
    }
    if !(0.0..=1.0).contains(&p.capture.min_confidence) {
        return Err(anyhow!("capture.min_confidence must be in [0, 1]"));
    }
    Ok(())
}
