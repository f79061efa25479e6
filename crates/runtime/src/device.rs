use once_cell::sync::OnceCell;
use sysinfo::System;
use tracing::info;

/// Coarse device-capability bucket driving rendering-quality defaults.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeviceTier {
    Low,
    Mid,
    High,
}

impl DeviceTier {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceTier::Low => "low",
            DeviceTier::Mid => "mid",
            DeviceTier::High => "high",
        }
    }
}

/// Fixed rendering configuration for a [`DeviceTier`].
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProfile {
    pub tier: DeviceTier,
    /// Device-pixel-ratio clamp `(min, max)` for the 3D canvas.
    pub dpr_range: (f64, f64),
    /// Number of decorative objects in the animated background.
    pub background_object_count: u32,
    /// Upper bound on background animation frames per second.
    pub background_fps_cap: u32,
    /// Delay before thumbnail generation starts.
    pub thumbnail_delay_ms: u32,
}

impl DeviceProfile {
    pub fn for_tier(tier: DeviceTier) -> Self {
        match tier {
            DeviceTier::Low => Self {
                tier,
                dpr_range: (1.0, 1.0),
                background_object_count: 8,
                background_fps_cap: 24,
                thumbnail_delay_ms: 3000,
            },
            DeviceTier::Mid => Self {
                tier,
                dpr_range: (1.0, 1.5),
                background_object_count: 16,
                background_fps_cap: 30,
                thumbnail_delay_ms: 1500,
            },
            DeviceTier::High => Self {
                tier,
                dpr_range: (1.0, 2.0),
                background_object_count: 32,
                background_fps_cap: 60,
                thumbnail_delay_ms: 500,
            },
        }
    }
}

/// Raw host signals used for scoring. Every field may be unavailable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceSignals {
    pub logical_cores: Option<u32>,
    pub device_memory_gb: Option<f64>,
    pub user_agent: Option<String>,
}

const MOBILE_UA_MARKERS: &[&str] = &[
    "android",
    "webos",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
    "mobile",
];

// Neutral stand-in when the host does not report a core count.
const NEUTRAL_CORES: u32 = 4;

impl DeviceSignals {
    /// Reads what the native host can tell us. There is no user agent
    /// outside a browser, so the mobile heuristic never fires here.
    pub fn from_host() -> Self {
        let logical_cores = std::thread::available_parallelism()
            .ok()
            .map(|n| n.get() as u32);

        let mut system = System::new();
        system.refresh_memory();
        let total = system.total_memory();
        let device_memory_gb = if total > 0 {
            Some(total as f64 / (1024.0 * 1024.0 * 1024.0))
        } else {
            None
        };

        Self {
            logical_cores,
            device_memory_gb,
            user_agent: None,
        }
    }

    pub fn is_mobile(&self) -> bool {
        let Some(ua) = self.user_agent.as_deref() else {
            return false;
        };
        let ua = ua.to_ascii_lowercase();
        MOBILE_UA_MARKERS.iter().any(|m| ua.contains(m))
    }

    pub fn score(&self) -> i32 {
        let cores = self.logical_cores.unwrap_or(NEUTRAL_CORES);
        let core_score = if cores >= 8 {
            3
        } else if cores >= 4 {
            2
        } else {
            1
        };

        let memory_score = match self.device_memory_gb {
            Some(gb) if gb >= 8.0 => 3,
            Some(gb) if gb >= 4.0 => 2,
            Some(_) => 1,
            None => 2,
        };

        let mobile_score = if self.is_mobile() { -1 } else { 0 };

        core_score + memory_score + mobile_score
    }
}

pub fn classify(signals: &DeviceSignals) -> DeviceProfile {
    let score = signals.score();
    let tier = if score <= 3 {
        DeviceTier::Low
    } else if score <= 5 {
        DeviceTier::Mid
    } else {
        DeviceTier::High
    };
    DeviceProfile::for_tier(tier)
}

static DEVICE_PROFILE: OnceCell<DeviceProfile> = OnceCell::new();

/// Computes the process-wide profile from `signals` unless one already exists.
///
/// Returns the memoized profile either way; later calls never recompute.
pub fn init_device_profile(signals: &DeviceSignals) -> &'static DeviceProfile {
    DEVICE_PROFILE.get_or_init(|| {
        let profile = classify(signals);
        info!(
            tier = profile.tier.as_str(),
            score = signals.score(),
            "device profile computed"
        );
        profile
    })
}

/// Lazy getter for the process-wide profile, probing the host on first use.
pub fn detect_device_tier() -> &'static DeviceProfile {
    if let Some(profile) = DEVICE_PROFILE.get() {
        return profile;
    }
    init_device_profile(&DeviceSignals::from_host())
}
