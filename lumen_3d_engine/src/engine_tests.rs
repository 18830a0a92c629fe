//! Unit tests for engine.rs
//!
//! These tests swap the global logger, so they run serially.

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::log::{Logger, LogEntry, LogSeverity};
use serial_test::serial;
use std::sync::{Arc, Mutex};

// ============================================================================
// TEST LOGGER
// ============================================================================

/// Captures entries emitted under one source so parallel tests don't interfere
struct CaptureLogger {
    source: &'static str,
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

fn install_capture(source: &'static str) -> Arc<Mutex<Vec<LogEntry>>> {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(CaptureLogger { source, entries: entries.clone() });
    entries
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        if entry.source == self.source {
            self.entries.lock().unwrap().push(entry.clone());
        }
    }
}

// ============================================================================
// LOGGER REGISTRY
// ============================================================================

#[test]
#[serial]
fn test_set_logger_receives_messages() {
    let entries = install_capture("lumen3d::engine_test::set");

    Engine::log(LogSeverity::Info, "lumen3d::engine_test::set", "first".to_string());
    crate::engine_warn!("lumen3d::engine_test::set", "second {}", 2);

    {
        let captured = entries.lock().unwrap();
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0].severity, LogSeverity::Info);
        assert_eq!(captured[0].message, "first");
        assert_eq!(captured[1].severity, LogSeverity::Warn);
        assert_eq!(captured[1].message, "second 2");
        assert!(captured[1].file.is_none());
    }

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_error_macro_carries_location() {
    let entries = install_capture("lumen3d::engine_test::loc");

    crate::engine_error!("lumen3d::engine_test::loc", "boom");

    {
        let captured = entries.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].severity, LogSeverity::Error);
        assert!(captured[0].file.unwrap().ends_with("engine_tests.rs"));
        assert!(captured[0].line.is_some());
    }

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_min_severity_filters_lower_levels() {
    let entries = install_capture("lumen3d::engine_test::filter");
    Engine::set_min_severity(LogSeverity::Warn);

    crate::engine_debug!("lumen3d::engine_test::filter", "hidden");
    crate::engine_info!("lumen3d::engine_test::filter", "hidden");
    crate::engine_warn!("lumen3d::engine_test::filter", "shown");
    crate::engine_error!("lumen3d::engine_test::filter", "shown");

    assert_eq!(entries.lock().unwrap().len(), 2);

    // reset_logger also clears the filter
    Engine::reset_logger();
    let entries = install_capture("lumen3d::engine_test::filter");
    crate::engine_trace!("lumen3d::engine_test::filter", "visible again");
    assert_eq!(entries.lock().unwrap().len(), 1);

    Engine::reset_logger();
}

// ============================================================================
// EXIT CODES
// ============================================================================

#[test]
#[serial]
fn test_exit_code_success_is_zero() {
    let result: Result<()> = Ok(());
    assert_eq!(Engine::exit_code(&result), 0);
}

#[test]
#[serial]
fn test_exit_code_failure_is_one_and_logged() {
    let entries = install_capture("lumen3d::Engine");

    let result: Result<()> = Err(Error::AssetLoad("shaders/scene.vert.spv".to_string()));
    assert_eq!(Engine::exit_code(&result), 1);

    {
        let captured = entries.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert!(captured[0].message.contains("shaders/scene.vert.spv"));
    }

    Engine::reset_logger();
}
