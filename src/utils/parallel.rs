use log::{info, warn};

/// Sizes the global rayon pool used for per-channel resampling.
///
/// Defaults to one thread per logical CPU. Returns the pool size in effect,
/// which is the existing one if the pool was already built.
pub fn init_thread_pool(threads: Option<usize>) -> usize {
    let requested = threads.filter(|&n| n > 0).unwrap_or_else(num_cpus::get);
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(requested)
        .thread_name(|i| format!("resample-{i}"))
        .build_global()
    {
        warn!("Failed to configure thread pool: {e}. Using existing pool.");
    }
    info!("Using {} CPU threads for resampling", rayon::current_num_threads());
    rayon::current_num_threads()
}
