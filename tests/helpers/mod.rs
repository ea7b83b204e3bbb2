#![allow(dead_code)]
//! Shared fixtures for the integration suites.

pub mod fake_inventory;

use dnsreconcile::config::Config;

pub const A_RESOLVER: &str = "10.0.0.1";
pub const B_RESOLVER: &str = "10.0.0.2";

/// A configuration with both endpoints set and fast timeouts.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.source_a = Some(
        format!("admin:secret@gtm.example/{}", A_RESOLVER)
            .parse()
            .unwrap(),
    );
    config.source_b = Some(
        format!("admin:secret@zdns.example/{}", B_RESOLVER)
            .parse()
            .unwrap(),
    );
    config.probe.timeout_ms = 500;
    config.performance.worker_concurrency = 4;
    config
}

/// One presentation-format answer line.
pub fn a_answer(name: &str, ip: &str) -> String {
    format!("{} 300 IN A {}", name, ip)
}
