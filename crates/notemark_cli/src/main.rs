//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `notemark_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

fn main() {
    println!("notemark_core ping={}", notemark_core::ping());
    println!("notemark_core version={}", notemark_core::core_version());
}
