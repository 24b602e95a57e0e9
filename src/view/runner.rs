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

use std::future::Future;
use std::io::{self, Write};
use std::pin::Pin;
use std::time::Duration;

use chrono::Local;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::cli::OutputFormat;
use crate::context::MonitorContext;
use crate::error::Result;
use crate::view::render::{self, SampleWriter};

/// Outcome of a driver run, mapped to the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Failure,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Failure => 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub period: Duration,
    /// Stop after this many polling passes; `None` runs until interrupted.
    pub max_ticks: Option<u64>,
    pub format: OutputFormat,
}

/// Turn the result of context initialization into a usable context.
///
/// Prints the failure and returns `None` when initialization failed or no
/// device was found; in the latter case the context is shut down here.
fn open_context<W: Write>(
    init: Result<MonitorContext>,
    format: OutputFormat,
    out: &mut W,
) -> io::Result<Option<MonitorContext>> {
    let mut ctx = match init {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("GPU monitor initialization failed: {e}");
            if format == OutputFormat::Text {
                render::print_initialization_failure(out, &e)?;
            }
            return Ok(None);
        }
    };

    let count = ctx.device_count();
    if count == 0 {
        warn!("No GPUs detected by the {} backend", ctx.backend_name());
        if format == OutputFormat::Text {
            render::print_no_devices(out)?;
        }
        ctx.shutdown();
        return Ok(None);
    }

    if format == OutputFormat::Text {
        render::print_device_count(out, count)?;
    } else {
        info!("Found {count} GPU(s)");
    }
    Ok(Some(ctx))
}

/// How a polling pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Completed,
    /// `shutdown` resolved before the remaining devices were read.
    Interrupted,
}

/// Whether `shutdown` has resolved, without waiting for it.
async fn interrupted<F: Future<Output = ()>>(shutdown: Pin<&mut F>) -> bool {
    tokio::select! {
        biased;
        _ = shutdown => true,
        _ = std::future::ready(()) => false,
    }
}

/// Read every device once and write the results.
///
/// `shutdown` is checked before each read; once it resolves no further
/// device is touched. Per-device failures are reported inline and never
/// stop the pass.
pub async fn poll_once<W, F>(
    ctx: &MonitorContext,
    format: OutputFormat,
    out: &mut W,
    mut shutdown: Pin<&mut F>,
) -> io::Result<PassOutcome>
where
    W: Write,
    F: Future<Output = ()>,
{
    let writer = SampleWriter::new(format, Local::now());
    writer.begin(out)?;
    for device in ctx.devices() {
        if interrupted(shutdown.as_mut()).await {
            debug!("Pass interrupted before GPU {}", device.index());
            out.flush()?;
            return Ok(PassOutcome::Interrupted);
        }
        let result = ctx.read_temperatures(device.index());
        if let Err(e) = &result {
            warn!("Failed to get temperatures for GPU {}: {e}", device.index());
        }
        writer.write_result(out, device, &result)?;
    }
    out.flush()?;
    Ok(PassOutcome::Completed)
}

fn report_stopped<W: Write>(format: OutputFormat, out: &mut W) -> io::Result<()> {
    if format == OutputFormat::Text {
        render::print_stopped(out)
    } else {
        info!("Monitoring stopped by user");
        Ok(())
    }
}

/// Poll all devices every `options.period` until `shutdown` resolves or
/// `options.max_ticks` passes have run.
///
/// `shutdown` is observed between passes and between the reads of a pass;
/// a read already in progress is never cut short. The context is released
/// on every exit path.
pub async fn run_watch<W, F>(
    init: Result<MonitorContext>,
    options: &WatchOptions,
    out: &mut W,
    shutdown: F,
) -> ExitStatus
where
    W: Write,
    F: Future<Output = ()>,
{
    let mut ctx = match open_context(init, options.format, out) {
        Ok(Some(ctx)) => ctx,
        Ok(None) => return ExitStatus::Failure,
        Err(e) => {
            error!("Failed to write output: {e}");
            return ExitStatus::Failure;
        }
    };

    let status = match watch_loop(&ctx, options, out, shutdown).await {
        Ok(()) => ExitStatus::Success,
        Err(e) => {
            error!("Failed to write output: {e}");
            ExitStatus::Failure
        }
    };
    ctx.shutdown();
    status
}

async fn watch_loop<W, F>(
    ctx: &MonitorContext,
    options: &WatchOptions,
    out: &mut W,
    shutdown: F,
) -> io::Result<()>
where
    W: Write,
    F: Future<Output = ()>,
{
    let mut interval = tokio::time::interval(options.period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut ticks = 0u64;
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                return report_stopped(options.format, out);
            }
            _ = interval.tick() => {
                if poll_once(ctx, options.format, out, shutdown.as_mut()).await?
                    == PassOutcome::Interrupted
                {
                    return report_stopped(options.format, out);
                }
                ticks += 1;
                if options.max_ticks.is_some_and(|max| ticks >= max) {
                    info!("Stopping after {ticks} polling pass(es)");
                    return Ok(());
                }
            }
        }
    }
}

/// Print the enumerated devices once.
pub fn run_list<W: Write>(init: Result<MonitorContext>, format: OutputFormat, out: &mut W) -> ExitStatus {
    let listed = open_context(init, format, out).and_then(|ctx| match ctx {
        Some(mut ctx) => {
            let printed = render::print_devices(out, format, ctx.devices());
            ctx.shutdown();
            printed.map(|()| ExitStatus::Success)
        }
        None => Ok(ExitStatus::Failure),
    });
    listed.unwrap_or_else(|e| {
        error!("Failed to write output: {e}");
        ExitStatus::Failure
    })
}
