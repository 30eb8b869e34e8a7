/// Upload body chunk sizing
///
/// Smaller chunks give finer progress on small files, larger ones cut
/// per-chunk overhead on big ones.
pub fn calculate_optimal_chunk_size(file_size: u64) -> usize {
    const MB_10: u64 = 10 * 1024 * 1024; // 10MB
    const MB_100: u64 = 100 * 1024 * 1024; // 100MB
    const GB_1: u64 = 1024 * 1024 * 1024; // 1GB

    if file_size <= MB_10 {
        // 16KB keeps progress smooth at the 64KB reporting step
        16 * 1024
    } else if file_size <= MB_100 {
        64 * 1024
    } else if file_size <= GB_1 {
        256 * 1024
    } else {
        1024 * 1024
    }
}
