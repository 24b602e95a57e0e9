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

use std::io;

use clap::Parser;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gpumonitor::cli::{BackendArgs, Cli, Commands, WatchArgs};
use gpumonitor::utils::ensure_root_privileges;
use gpumonitor::view::{run_list, run_watch, WatchOptions};
use gpumonitor::MonitorContext;

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "gpumonitor=debug"
    } else {
        "gpumonitor=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn open_context(args: &BackendArgs) -> gpumonitor::Result<MonitorContext> {
    if args.requires_root() {
        ensure_root_privileges();
    }
    MonitorContext::with_config(args.monitor_config())
}

async fn watch(args: WatchArgs) -> i32 {
    let options = WatchOptions {
        period: args.period(),
        max_ticks: args.count,
        format: args.backend.format,
    };
    let init = open_context(&args.backend);
    let mut stdout = io::stdout().lock();
    run_watch(init, &options, &mut stdout, shutdown_signal())
        .await
        .code()
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match cli.command {
        Some(Commands::Watch(args)) => watch(args).await,
        Some(Commands::List(args)) => {
            let init = open_context(&args);
            run_list(init, args.format, &mut io::stdout().lock()).code()
        }
        // Default to watch mode when no command is specified
        None => watch(cli.watch).await,
    };
    std::process::exit(code);
}
