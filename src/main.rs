/*!
 * Heap Simulator - Main Entry Point
 *
 * Hosted walk-through of the allocator:
 * - Loads a sample cache until the stealable region is full
 * - Holds the current sound's sample loaded while a large buffer is allocated
 * - Prints the resulting statistics as JSON
 *
 * Usage: heapsim [SAMPLE_COUNT]
 */

use anyhow::Context;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

use workstation_memory::{
    init_tracing, AllocatorConfig, Eviction, GeneralMemoryAllocator, MemoryLayout, Stealable,
    StealableQueue,
};

const SAMPLE_SIZE: usize = 48 * 1024;
const STEALABLE_BYTES: usize = 512 * 1024;

/// Cached audio cluster for one sample
struct SampleCluster {
    name: String,
    in_current_song: bool,
    evicted: Arc<Mutex<Vec<String>>>,
}

impl Stealable for SampleCluster {
    fn appropriate_queue(&self) -> StealableQueue {
        if self.in_current_song {
            StealableQueue::CurrentSongSampleData
        } else {
            StealableQueue::NoSongSampleData
        }
    }

    fn on_stolen(&mut self, eviction: &mut Eviction) {
        info!(
            sample = %self.name,
            bytes = eviction.size(),
            "sample cluster evicted"
        );
        self.evicted.lock().push(self.name.clone());
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let samples: usize = match std::env::args().nth(1) {
        Some(arg) => arg.parse().context("SAMPLE_COUNT must be a number")?,
        None => 16,
    };

    let layout = MemoryLayout::packed(
        0x1000_0000,
        [STEALABLE_BYTES, 64 * 1024, 64 * 1024, 16 * 1024, 16 * 1024],
    )
    .context("building hosted layout")?;
    let config = AllocatorConfig::default()
        .with_layout(layout)
        .with_trap_misuse(false)
        .with_verify_invariants(true);
    let allocator = GeneralMemoryAllocator::new(config).context("building allocator")?;
    info!("Heap simulator starting with {} samples", samples);

    let evicted = Arc::new(Mutex::new(Vec::new()));
    let mut handles = Vec::with_capacity(samples);
    for i in 0..samples {
        let cluster = SampleCluster {
            name: format!("sample-{:02}", i),
            in_current_song: i % 4 == 0,
            evicted: Arc::clone(&evicted),
        };
        let handle = allocator
            .alloc_stealable(SAMPLE_SIZE, Box::new(cluster), None)
            .with_context(|| format!("loading sample {}", i))?;
        handles.push(handle);
    }

    // The sound being played must stay loaded while the mixer allocates
    let playing = handles.last().context("no samples loaded")?.id;
    let loan = allocator.claim(playing)?;
    let mix_buffer = allocator
        .alloc_low_speed(3 * SAMPLE_SIZE)
        .context("allocating mix buffer")?;
    info!(
        "Mix buffer at 0x{:x} in {} region",
        mix_buffer,
        allocator.region_of(mix_buffer).map(|t| t.name()).unwrap_or("no")
    );
    drop(loan);

    let resident = handles
        .iter()
        .filter(|handle| allocator.is_resident(handle.id))
        .count();
    info!(
        "{} of {} samples resident, {} evicted",
        resident,
        handles.len(),
        evicted.lock().len()
    );

    allocator.dealloc(mix_buffer)?;
    allocator.check_invariants()?;
    let stats = allocator.stats()?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
