use std::time::Duration;

use ticket_dispatch::config::Config;

// Environment is process-global, so every case lives in one test.
#[test]
fn config_from_env() {
    unsafe {
        std::env::remove_var("DISPATCH_TICK_SECS");
        std::env::remove_var("DISPATCH_ROSTER");
        std::env::remove_var("LOG_LEVEL");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.tick_interval, Some(Duration::from_secs(10)));
    assert!(config.roster_path.is_none());
    assert_eq!(config.log_level, "info");

    unsafe {
        std::env::set_var("DISPATCH_TICK_SECS", "3");
        std::env::set_var("DISPATCH_ROSTER", "/etc/dispatch/roster.toml");
        std::env::set_var("LOG_LEVEL", "debug");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.tick_interval, Some(Duration::from_secs(3)));
    assert_eq!(
        config.roster_path.as_deref(),
        Some(std::path::Path::new("/etc/dispatch/roster.toml"))
    );
    assert_eq!(config.log_level, "debug");

    unsafe {
        std::env::set_var("DISPATCH_TICK_SECS", "0");
    }
    assert!(Config::from_env().unwrap().tick_interval.is_none());

    unsafe {
        std::env::set_var("DISPATCH_TICK_SECS", "soon");
    }
    assert!(Config::from_env().is_err());

    unsafe {
        std::env::remove_var("DISPATCH_TICK_SECS");
        std::env::remove_var("DISPATCH_ROSTER");
        std::env::remove_var("LOG_LEVEL");
    }
}
