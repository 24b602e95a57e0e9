use std::path::PathBuf;
use std::time::Duration;

/// Application configuration constants
pub struct AppConfig;

impl AppConfig {
    // Polling
    pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 1;
    pub const SLOW_READ_THRESHOLD_MS: u64 = 250; // Reads are expected to be sub-millisecond

    // Native record layout
    pub const MESSAGE_BUFFER_LEN: usize = 256; // Includes the terminating NUL

    // Sensor sanity
    pub const MIN_SANE_CELSIUS: u32 = 0;
    pub const MAX_SANE_CELSIUS: u32 = 150;

    // Enumeration
    pub const MAX_DEVICES: usize = 256;

    // Native library discovery
    pub const NATIVE_LIBRARY_PATHS: &'static [&'static str] = &[
        "libgpumonitor.so",
        "/usr/lib/libgpumonitor.so",
        "/usr/local/lib/libgpumonitor.so",
    ];

    // PCI
    pub const SYSFS_PCI_DEVICES: &'static str = "/sys/bus/pci/devices";
}

/// Which telemetry backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// NVML first, then the native library.
    #[default]
    Auto,
    Nvml,
    Native,
    Mock,
}

/// Runtime configuration for [`MonitorContext`](crate::MonitorContext).
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Backend to open.
    /// Default: [`BackendKind::Auto`]
    pub backend: BackendKind,
    /// Explicit path to an existing `libgpumonitor.so`, tried before the
    /// standard search list.
    pub library_path: Option<PathBuf>,
    /// Root of the PCI device tree used to locate register windows.
    /// Default: `/sys/bus/pci/devices`
    pub sysfs_root: PathBuf,
    /// Reads slower than this are logged as warnings.
    /// Default: 250ms
    pub slow_read_threshold: Duration,
    /// Highest temperature accepted as a physical reading.
    /// Default: 150 °C
    pub max_sane_celsius: u32,
    /// Number of devices exposed by the mock backend.
    /// Default: 2
    pub mock_devices: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Auto,
            library_path: None,
            sysfs_root: PathBuf::from(AppConfig::SYSFS_PCI_DEVICES),
            slow_read_threshold: Duration::from_millis(AppConfig::SLOW_READ_THRESHOLD_MS),
            max_sane_celsius: AppConfig::MAX_SANE_CELSIUS,
            mock_devices: 2,
        }
    }
}

impl MonitorConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    pub fn sysfs_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sysfs_root = root.into();
        self
    }

    pub fn slow_read_threshold(mut self, threshold: Duration) -> Self {
        self.slow_read_threshold = threshold;
        self
    }

    /// Set the upper bound of the sane range.
    ///
    /// Values above [`AppConfig::MAX_SANE_CELSIUS`] are clamped to it.
    pub fn max_sane_celsius(mut self, celsius: u32) -> Self {
        self.max_sane_celsius = celsius.min(AppConfig::MAX_SANE_CELSIUS);
        self
    }

    pub fn mock_devices(mut self, count: usize) -> Self {
        self.mock_devices = count.min(AppConfig::MAX_DEVICES);
        self
    }
}
