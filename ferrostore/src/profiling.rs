// Copyright 2024 FerroStore Team
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

use pprof::ProfilerGuard;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{error, info, warn};

/// Profiler selection; supported value is `cpu`.
pub const ENV_PROFILER: &str = "FERROSTORE_PROFILER";

/// Directory profiling reports are written to on shutdown.
pub const ENV_PROFILE_DIR: &str = "FERROSTORE_PROFILE_DIR";

static PROFILER_GUARD: OnceLock<Arc<Mutex<ProfilerGuard<'static>>>> = OnceLock::new();

fn init_profiler() -> Result<(), Box<dyn std::error::Error>> {
    let guard = pprof::ProfilerGuardBuilder::default()
        .frequency(1000)
        .blocklist(&["libc", "libgcc", "pthread", "vdso"])
        .build()
        .map_err(|err| format!("Failed to build profiler guard: {err}"))?;

    PROFILER_GUARD
        .set(Arc::new(Mutex::new(guard)))
        .map_err(|_| "Failed to set profiler guard (already initialized)")?;

    info!("Performance profiler initialized");
    Ok(())
}

pub fn is_profiler_enabled() -> bool {
    PROFILER_GUARD.get().is_some()
}

/// Starts the profiler selected via the environment.
pub fn start_profiling_if_enabled() {
    match std::env::var(ENV_PROFILER).unwrap_or_default().as_str() {
        "cpu" => match init_profiler() {
            Ok(()) => info!("CPU profiling enabled via {} environment variable", ENV_PROFILER),
            Err(err) => error!("Failed to initialize profiler: {}", err),
        },
        profiler @ ("mem" | "block") => {
            warn!("{} profiling is not supported by the sampling profiler; ignoring", profiler);
        }
        "" => info!("Performance profiling disabled. Set {}=cpu to enable", ENV_PROFILER),
        other => warn!("Unknown profiler {:?}; supported values are cpu, mem, block", other),
    }
}

/// Writes the flamegraph report under the configured profile directory
/// and stops sampling. Called on shutdown.
pub fn stop_profiling() {
    let Some(guard) = PROFILER_GUARD.get() else {
        return;
    };
    let dir = std::env::var(ENV_PROFILE_DIR).unwrap_or_else(|_| ".".to_string());
    let path = Path::new(&dir).join("cpu-flamegraph.svg");

    let Ok(guard) = guard.lock() else {
        error!("profiler guard poisoned; skipping report");
        return;
    };
    let report = match guard.report().build() {
        Ok(report) => report,
        Err(err) => {
            error!("Failed to build profiling report: {}", err);
            return;
        }
    };
    match std::fs::File::create(&path) {
        Ok(file) => {
            if let Err(err) = report.flamegraph(file) {
                error!("Failed to write flamegraph to {}: {}", path.display(), err);
            } else {
                info!("Profiling report written to {}", path.display());
            }
        }
        Err(err) => error!("Failed to create {}: {}", path.display(), err),
    }
}
