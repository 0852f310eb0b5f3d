//! OracBench Example Suite
//!
//! Five categories wired the way a real suite would be: latency and memory
//! are parallel-safe, security runs alone, energy needs memory and scaling
//! needs both latency and memory.
//!
//! Run with:
//!   cargo run --example suite                          # Run everything
//!   cargo run --example suite -- --parallel --watch    # Overlap safe categories, stream snapshots
//!   cargo run --example suite -- --mode scaling        # Scaling plus its prerequisites
//!   cargo run --example suite -- plan --parallel       # Show the wave plan
//!   cargo run --example suite -- --help                # Show all options

use oracbench::prelude::*;
use std::hint::black_box;
use std::time::{Duration, Instant};

// ============================================================================
// Probes
// ============================================================================

/// Round-trip latency of a timer wakeup
async fn latency(ctx: ProbeContext) -> Result<ProbeResult, ProbeError> {
    let mut samples = Vec::with_capacity(50);
    for _ in 0..50 {
        if ctx.is_cancelled() {
            return Err(ProbeError::Cancelled);
        }
        let start = Instant::now();
        tokio::time::sleep(Duration::from_millis(1)).await;
        samples.push(start.elapsed().as_secs_f64() * 1_000.0);
    }

    samples.sort_by(|a, b| a.total_cmp(b));
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    let p99 = samples[samples.len() * 99 / 100];

    Ok(ProbeResult::new("wakeup_ms", mean)
        .with_unit("ms")
        .with_secondary("p99_ms", p99)
        .with_secondary("samples", samples.len() as f64))
}

/// Allocation throughput for a burst of buffers
async fn memory(_ctx: ProbeContext) -> Result<ProbeResult, ProbeError> {
    let start = Instant::now();
    let buffers: Vec<Vec<u8>> = (0..256).map(|i| vec![i as u8; 64 * 1024]).collect();
    let bytes: usize = black_box(&buffers).iter().map(Vec::len).sum();
    let elapsed = start.elapsed().as_secs_f64();

    Ok(ProbeResult::new("alloc_mb_per_s", bytes as f64 / 1_048_576.0 / elapsed)
        .with_unit("MB/s")
        .with_secondary("allocated_mb", bytes as f64 / 1_048_576.0)
        .with_timing(elapsed * 1_000.0, 1))
}

/// Counts environment variables that look like they carry secrets
async fn security(_ctx: ProbeContext) -> Result<ProbeResult, ProbeError> {
    let exposed = std::env::vars()
        .filter(|(key, _)| {
            let key = key.to_ascii_uppercase();
            ["TOKEN", "SECRET", "PASSWORD", "API_KEY"]
                .iter()
                .any(|marker| key.contains(marker))
        })
        .count();

    Ok(ProbeResult::new("exposed_secrets", exposed as f64))
}

/// Task spawn throughput on the current runtime
async fn scaling(ctx: ProbeContext) -> Result<ProbeResult, ProbeError> {
    let start = Instant::now();
    let mut handles = Vec::with_capacity(1_000);
    for i in 0..1_000u64 {
        handles.push(tokio::spawn(async move { black_box(i * i) }));
    }
    for handle in handles {
        if ctx.is_cancelled() {
            return Err(ProbeError::Cancelled);
        }
        handle
            .await
            .map_err(|e| ProbeError::failed(format!("task failed: {}", e)))?;
    }
    let elapsed = start.elapsed().as_secs_f64();

    Ok(ProbeResult::new("tasks_per_s", 1_000.0 / elapsed)
        .with_unit("tasks/s")
        .with_timing(elapsed * 1_000.0, 1_000))
}

/// Rough energy estimate from busy CPU time at a nominal package power
async fn energy(_ctx: ProbeContext) -> Result<ProbeResult, ProbeError> {
    const NOMINAL_WATTS: f64 = 15.0;

    let start = Instant::now();
    let mut acc = 0u64;
    for i in 0..5_000_000u64 {
        acc = acc.wrapping_add(black_box(i).rotate_left(7));
    }
    black_box(acc);
    let seconds = start.elapsed().as_secs_f64();

    Ok(ProbeResult::new("joules", seconds * NOMINAL_WATTS)
        .with_unit("J")
        .with_secondary("busy_s", seconds))
}

// ============================================================================
// Registry
// ============================================================================

fn build_registry() -> Result<CategoryRegistry, oracbench::RegistryError> {
    let mut registry = CategoryRegistry::new();
    registry
        .register(
            CategoryDef::new("latency").parallel_safe(true),
            FnProbe::new(latency),
        )?
        .register(
            CategoryDef::new("memory").parallel_safe(true),
            FnProbe::new(memory),
        )?
        .register(CategoryDef::new("security"), FnProbe::new(security))?
        .register(
            CategoryDef::new("energy").depends_on(["memory"]),
            FnProbe::new(energy),
        )?
        .register(
            CategoryDef::new("scaling").depends_on(["latency", "memory"]),
            FnProbe::new(scaling),
        )?;
    Ok(registry)
}

fn main() -> anyhow::Result<()> {
    let registry = build_registry()?;
    oracbench::run(&registry)
}
