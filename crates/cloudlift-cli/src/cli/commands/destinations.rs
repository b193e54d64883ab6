//! `cloudlift destinations` – show which providers are configured.

use cloudlift_core::destinations::{DestinationSet, Provider};

pub fn run_destinations(set: &DestinationSet) {
    println!("{:<12} {:<9} {}", "DEST", "STATE", "DETAIL");
    for provider in Provider::ALL {
        if let Some(dest) = set.get(provider) {
            let limit = dest
                .size_limit
                .map(|l| format!(", limit {:.2} GiB", l as f64 / (1024.0 * 1024.0 * 1024.0)))
                .unwrap_or_default();
            println!(
                "{:<12} {:<9} bucket {} at {}{}",
                provider.as_str(),
                "enabled",
                dest.bucket,
                dest.endpoint,
                limit
            );
        } else {
            let missing = set
                .disabled()
                .iter()
                .find(|d| d.provider == provider)
                .map(|d| d.missing.join(", "))
                .unwrap_or_default();
            println!(
                "{:<12} {:<9} missing {}",
                provider.as_str(),
                "disabled",
                missing
            );
        }
    }
}
