// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::common::config::{AppConfig, BackendKind, MonitorConfig};

#[derive(Parser)]
#[command(name = "gpu-monitor", author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    // Arguments of the default `watch` command
    #[command(flatten)]
    pub watch: WatchArgs,

    /// Enable debug logging on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll GPU temperatures until interrupted. (default)
    Watch(WatchArgs),
    /// List detected GPUs and exit.
    List(BackendArgs),
}

#[derive(Args, Clone, Debug)]
pub struct BackendArgs {
    /// Telemetry backend to use.
    #[arg(short, long, value_enum, default_value_t = BackendArg::Auto)]
    pub backend: BackendArg,
    /// Path to an existing libgpumonitor.so for the native backend.
    #[arg(long)]
    pub library: Option<PathBuf>,
    /// Number of simulated devices for the mock backend.
    #[arg(long, default_value_t = 2)]
    pub mock_devices: usize,
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl Default for BackendArgs {
    fn default() -> Self {
        Self {
            backend: BackendArg::Auto,
            library: None,
            mock_devices: 2,
            format: OutputFormat::Text,
        }
    }
}

impl BackendArgs {
    pub fn monitor_config(&self) -> MonitorConfig {
        let mut config = MonitorConfig::new()
            .backend(self.backend.into())
            .mock_devices(self.mock_devices);
        if let Some(path) = &self.library {
            config = config.library_path(path);
        }
        config
    }

    /// Only the mock backend can run without root.
    pub fn requires_root(&self) -> bool {
        self.backend != BackendArg::Mock
    }
}

#[derive(Args, Clone, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub backend: BackendArgs,
    /// The interval in seconds between polling passes.
    #[arg(short, long, default_value_t = AppConfig::DEFAULT_POLL_INTERVAL_SECS)]
    pub interval: u64,
    /// Stop after this many polling passes.
    #[arg(short = 'n', long)]
    pub count: Option<u64>,
}

impl Default for WatchArgs {
    fn default() -> Self {
        Self {
            backend: BackendArgs::default(),
            interval: AppConfig::DEFAULT_POLL_INTERVAL_SECS,
            count: None,
        }
    }
}

impl WatchArgs {
    /// Polling period; a zero interval is treated as one second.
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.interval.max(1))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Auto,
    Nvml,
    Native,
    Mock,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => BackendKind::Auto,
            BackendArg::Nvml => BackendKind::Nvml,
            BackendArg::Native => BackendKind::Native,
            BackendArg::Mock => BackendKind::Mock,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_watch() {
        let cli = Cli::try_parse_from(["gpu-monitor"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
        assert_eq!(cli.watch.interval, AppConfig::DEFAULT_POLL_INTERVAL_SECS);
        assert_eq!(cli.watch.backend.backend, BackendArg::Auto);

        let cli = Cli::try_parse_from(["gpu-monitor", "--backend", "mock", "-n", "2"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.watch.backend.backend, BackendArg::Mock);
        assert_eq!(cli.watch.count, Some(2));
    }

    #[test]
    fn test_watch_arguments() {
        let cli = Cli::try_parse_from([
            "gpu-monitor",
            "watch",
            "--interval",
            "5",
            "--backend",
            "mock",
            "--mock-devices",
            "4",
            "--format",
            "json",
            "-n",
            "3",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Some(Commands::Watch(args)) = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(args.period(), Duration::from_secs(5));
        assert_eq!(args.count, Some(3));
        assert_eq!(args.backend.format, OutputFormat::Json);
        assert!(!args.backend.requires_root());

        let config = args.backend.monitor_config();
        assert_eq!(config.backend, BackendKind::Mock);
        assert_eq!(config.mock_devices, 4);
    }

    #[test]
    fn test_list_with_library_path() {
        let cli = Cli::try_parse_from([
            "gpu-monitor",
            "list",
            "--backend",
            "native",
            "--library",
            "/opt/lib/libgpumonitor.so",
        ])
        .unwrap();
        let Some(Commands::List(args)) = cli.command else {
            panic!("expected list");
        };
        assert!(args.requires_root());
        assert_eq!(
            args.monitor_config().library_path,
            Some(PathBuf::from("/opt/lib/libgpumonitor.so"))
        );
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let args = WatchArgs {
            interval: 0,
            ..WatchArgs::default()
        };
        assert_eq!(args.period(), Duration::from_secs(1));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        assert!(Cli::try_parse_from(["gpu-monitor", "--backend", "rocm"]).is_err());
    }
}
